use serde::Serialize;

use crate::models::MaintenancePolicy;

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct ServerState {
    pub id: usize,
    pub available: bool,
    pub occupied: bool,
    pub remaining_service: i64,
    pub remaining_maintenance: u64,
    pub maintenance_pending: bool,
}

impl ServerState {
    pub fn new(id: usize) -> Self {
        Self {
            id,
            available: true,
            ..Self::default()
        }
    }

    pub fn is_idle(&self) -> bool {
        self.available && !self.occupied
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
pub struct QueueState {
    pub length: u64,
    pub admitted: u64,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SimulationState {
    pub tick: u64,
    pub arrival_cursor: usize,
    pub service_cursor: usize,
    pub queue: QueueState,
    pub servers: Vec<ServerState>,
}

impl SimulationState {
    pub fn new(servers: usize) -> Self {
        Self {
            tick: 0,
            arrival_cursor: 0,
            service_cursor: 0,
            queue: QueueState::default(),
            servers: (0..servers).map(ServerState::new).collect(),
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub struct ServiceEvent {
    /// Server number, starting at 1.
    pub server: usize,
    pub start_tick: u64,
    pub duration: i64,
}

/// A customer dropped because maintenance preempted its service.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub struct Interruption {
    /// Server number, starting at 1.
    pub server: usize,
    pub tick: u64,
    pub remaining_service: i64,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TickObservation {
    pub tick: u64,
    pub queue_length: u64,
    pub admitted: u64,
    pub occupied: Vec<bool>,
    pub available: Vec<bool>,
    pub started: Vec<ServiceEvent>,
    pub interrupted: Vec<Interruption>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ServerSeries {
    pub occupied: Vec<bool>,
    pub available: Vec<bool>,
}

#[derive(Clone, Debug, Serialize)]
pub struct RunMetadata {
    pub duration_ticks: u64,
    pub servers: usize,
    pub policy: MaintenancePolicy,
    pub seed: Option<u64>,
}

#[derive(Clone, Debug, Serialize)]
pub struct SimulationResult {
    pub metadata: RunMetadata,
    pub ticks: Vec<u64>,
    pub queue_length: Vec<u64>,
    pub admitted: Vec<u64>,
    pub servers: Vec<ServerSeries>,
    pub service_log: Vec<ServiceEvent>,
    pub interruptions: Vec<Interruption>,
    /// Customers that arrived during the run, served or not.
    pub total_admitted: u64,
}

#[derive(Clone, Debug, Serialize, Eq, PartialEq)]
pub struct ServerSummary {
    pub server: usize,
    pub services: usize,
    pub busy_ticks: usize,
    pub down_ticks: usize,
}

#[derive(Clone, Debug, Serialize, Eq, PartialEq)]
pub struct RunSummary {
    pub total_admitted: u64,
    pub services_started: usize,
    pub interruptions: usize,
    pub max_queue_length: u64,
    pub final_queue_length: u64,
    pub servers: Vec<ServerSummary>,
}

impl SimulationResult {
    pub(crate) fn with_capacity(metadata: RunMetadata) -> Self {
        let ticks = metadata.duration_ticks as usize;
        let servers = (0..metadata.servers)
            .map(|_| ServerSeries {
                occupied: Vec::with_capacity(ticks),
                available: Vec::with_capacity(ticks),
            })
            .collect();
        Self {
            metadata,
            ticks: Vec::with_capacity(ticks),
            queue_length: Vec::with_capacity(ticks),
            admitted: Vec::with_capacity(ticks),
            servers,
            service_log: Vec::new(),
            interruptions: Vec::new(),
            total_admitted: 0,
        }
    }

    pub(crate) fn record(&mut self, observation: TickObservation) {
        self.ticks.push(observation.tick);
        self.queue_length.push(observation.queue_length);
        self.admitted.push(observation.admitted);
        for ((series, occupied), available) in self
            .servers
            .iter_mut()
            .zip(observation.occupied)
            .zip(observation.available)
        {
            series.occupied.push(occupied);
            series.available.push(available);
        }
        self.service_log.extend(observation.started);
        self.interruptions.extend(observation.interrupted);
    }

    pub fn summary(&self) -> RunSummary {
        let servers = self
            .servers
            .iter()
            .enumerate()
            .map(|(idx, series)| ServerSummary {
                server: idx + 1,
                services: self
                    .service_log
                    .iter()
                    .filter(|event| event.server == idx + 1)
                    .count(),
                busy_ticks: series.occupied.iter().filter(|flag| **flag).count(),
                down_ticks: series.available.iter().filter(|flag| !**flag).count(),
            })
            .collect();

        RunSummary {
            total_admitted: self.total_admitted,
            services_started: self.service_log.len(),
            interruptions: self.interruptions.len(),
            max_queue_length: self.queue_length.iter().copied().max().unwrap_or(0),
            final_queue_length: self.queue_length.last().copied().unwrap_or(0),
            servers,
        }
    }
}
