use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub duty_transitions_total: IntCounterVec,
    pub expiry_fires_total: IntCounterVec,
    pub drivers_on_duty: IntGauge,
    pub rescues_total: IntCounterVec,
    pub returns_logged_total: IntCounter,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let duty_transitions_total = IntCounterVec::new(
            Opts::new("duty_transitions_total", "Duty-cycle transitions by kind"),
            &["transition"],
        )
        .expect("valid duty_transitions_total metric");

        let expiry_fires_total = IntCounterVec::new(
            Opts::new(
                "expiry_fires_total",
                "Expiry timer and sweep fires by outcome",
            ),
            &["outcome"],
        )
        .expect("valid expiry_fires_total metric");

        let drivers_on_duty = IntGauge::new("drivers_on_duty", "Drivers currently on duty")
            .expect("valid drivers_on_duty metric");

        let rescues_total = IntCounterVec::new(
            Opts::new("rescues_total", "Rescue records by status change"),
            &["status"],
        )
        .expect("valid rescues_total metric");

        let returns_logged_total =
            IntCounter::new("returns_logged_total", "Completed-route summaries logged")
                .expect("valid returns_logged_total metric");

        registry
            .register(Box::new(duty_transitions_total.clone()))
            .expect("register duty_transitions_total");
        registry
            .register(Box::new(expiry_fires_total.clone()))
            .expect("register expiry_fires_total");
        registry
            .register(Box::new(drivers_on_duty.clone()))
            .expect("register drivers_on_duty");
        registry
            .register(Box::new(rescues_total.clone()))
            .expect("register rescues_total");
        registry
            .register(Box::new(returns_logged_total.clone()))
            .expect("register returns_logged_total");

        Self {
            registry,
            duty_transitions_total,
            expiry_fires_total,
            drivers_on_duty,
            rescues_total,
            returns_logged_total,
        }
    }

    pub fn encode(&self) -> Result<String, String> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();

        TextEncoder::new()
            .encode(&metric_families, &mut buffer)
            .map_err(|err| format!("failed to encode metrics: {err}"))?;

        String::from_utf8(buffer).map_err(|err| format!("metrics are not valid utf8: {err}"))
    }
}
