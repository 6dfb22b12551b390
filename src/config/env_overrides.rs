use super::EngineConfig;

impl EngineConfig {
    /// Apply environment variable overrides to config. Unparseable values
    /// are ignored.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    pub(super) fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(raw) = lookup("REWOO_ENABLE_REWOO")
            && let Some(enabled) = parse_bool(&raw)
        {
            self.enable_rewoo = enabled;
        }

        if let Some(raw) = lookup("REWOO_MAX_RETRIES")
            && let Ok(retries) = raw.trim().parse::<u32>()
        {
            self.max_retries = retries;
        }

        if let Some(raw) = lookup("REWOO_MAX_REPLANS")
            && let Ok(replans) = raw.trim().parse::<u32>()
        {
            self.max_replans_per_plan = replans;
        }

        if let Some(raw) = lookup("REWOO_MAX_PARALLEL")
            && let Ok(parallel) = raw.trim().parse::<usize>()
        {
            self.max_parallel_steps = parallel;
        }

        if let Some(raw) = lookup("REWOO_STEP_TIMEOUT_SECS")
            && let Ok(secs) = raw.trim().parse::<u64>()
        {
            self.step_timeout_secs = secs;
        }

        if let Some(level) = lookup("REWOO_LOG_LEVEL")
            && !level.trim().is_empty()
        {
            self.log_level = level.trim().to_ascii_lowercase();
        }
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
