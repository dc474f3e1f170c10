use std::sync::Arc;

use crate::collector::MetricsCollector;
use crate::emitter::Emitter;
use crate::metric_map::ApplicationMetricMap;
use crate::stop::StopSignal;
use crate::timers::GroupTimer;

/// Everything the background tasks run on.
pub struct ApplicationServices {
    pub stop: StopSignal,
    pub metric_map: Arc<ApplicationMetricMap>,
    pub emitter: Arc<Emitter>,
    pub collector: MetricsCollector,
    pub timers: Vec<GroupTimer>,
}
