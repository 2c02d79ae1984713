use crate::domain::{ModuleType, MountingType, SystemConfiguration, TrackingType};

/// Light-induced degradation, always applied.
pub const LIGHT_INDUCED_DEGRADATION_PCT: f64 = 1.5;
/// Nameplate rating loss, always applied.
pub const NAMEPLATE_RATING_LOSS_PCT: f64 = 1.0;
pub const MAX_SYSTEM_LOSSES_PCT: f64 = 50.0;

/// Total system losses in percent, capped at 50.
pub fn total_system_losses(cfg: &SystemConfiguration) -> f64 {
    let sum = cfg.soiling_loss_pct
        + cfg.shading_loss_pct
        + cfg.dc_loss_pct
        + cfg.ac_loss_pct
        + LIGHT_INDUCED_DEGRADATION_PCT
        + NAMEPLATE_RATING_LOSS_PCT;
    sum.clamp(0.0, MAX_SYSTEM_LOSSES_PCT)
}

/// Service encoding of the module type.
pub fn module_type_code(module_type: ModuleType) -> u8 {
    match module_type {
        ModuleType::Standard => 0,
        ModuleType::Premium => 1,
        ModuleType::ThinFilm => 2,
    }
}

/// Service encoding of the array type.
pub fn array_type_code(tracking: TrackingType, mounting: MountingType) -> u8 {
    match (tracking, mounting) {
        (TrackingType::Fixed, MountingType::GroundMount) => 0,
        (TrackingType::Fixed, MountingType::RoofMount) => 1,
        (TrackingType::SingleAxis, _) => 2,
        (TrackingType::DualAxis, _) => 4,
    }
}
