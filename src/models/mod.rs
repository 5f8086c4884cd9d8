//! Domain models shared by every component (§3).

mod analysis;
mod attendance;
mod behavioral;
mod challenge;
mod device_usage;
mod flags;

pub use analysis::{Analysis, EvidenceSummary};
pub use attendance::{AttendanceRecord, Outcome, OverrideRecord};
pub use behavioral::BehavioralBaseline;
pub use challenge::Challenge;
pub use device_usage::DeviceUsage;
pub use flags::{AntiProxyFlags, ProximityFacts, SignalClass};
