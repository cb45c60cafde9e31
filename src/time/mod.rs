/*!
 * Time
 * Causal (Lamport-synchronized) timestamps and thread timing capabilities
 */

pub mod causal;
pub mod thread_timing;

pub use causal::{CausalTimestamp, LamportClock};
pub use thread_timing::{default_provider, ThreadTimeProvider};
