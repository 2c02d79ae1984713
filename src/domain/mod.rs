pub mod bill;
pub mod equipment;
pub mod load;
pub mod production;
pub mod recommendation;
pub mod system;
pub mod tariff;

pub use bill::*;
pub use equipment::*;
pub use load::*;
pub use production::*;
pub use recommendation::*;
pub use system::*;
pub use tariff::*;

/// Mean calendar-month length used to turn daily irradiance into monthly totals.
pub const AVERAGE_DAYS_PER_MONTH: f64 = 30.44;

pub const HOURS_PER_YEAR: f64 = 8760.0;
