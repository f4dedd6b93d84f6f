use crate::settings::Settings;
use anyhow::{Result, bail};

/// Validate the configuration values
pub fn validate_config(settings: &Settings) -> Result<()> {
    let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
    if !valid_log_levels.contains(&settings.log_level.to_lowercase().as_str()) {
        bail!(
            "Invalid log level '{}'. Valid options are: {:?}",
            settings.log_level,
            valid_log_levels
        );
    }

    // Validate classifier settings
    let classifier = &settings.classifier;
    if classifier.share_threshold_pct == 0 || classifier.share_threshold_pct > 100 {
        bail!(
            "Classifier share_threshold_pct must be between 1 and 100, got {}",
            classifier.share_threshold_pct
        );
    }

    if classifier.history_days == 0 {
        bail!("Classifier history_days must be greater than 0");
    }

    if classifier
        .excluded_name_patterns
        .iter()
        .any(|p| p.trim().is_empty())
    {
        bail!("Classifier excluded_name_patterns cannot contain empty patterns");
    }

    if classifier.excluded_peer_ids.iter().any(|id| id.is_empty()) {
        bail!("Classifier excluded_peer_ids cannot contain empty ids");
    }

    // Validate job settings
    if settings.jobs.marker.trim().is_empty() {
        bail!("Job marker cannot be empty");
    }

    if settings.jobs.log_name_max_len == 0 {
        bail!("Job log_name_max_len must be greater than 0");
    }

    // Validate notifier settings
    if settings.notifier.interval_seconds == 0 {
        bail!("Notifier interval_seconds must be greater than 0");
    }

    for (tag, id) in &settings.tags {
        if tag.is_empty() || id.is_empty() {
            bail!("Tag entries need both a tag and a peer id, got '{tag}' -> '{id}'");
        }
    }

    Ok(())
}
