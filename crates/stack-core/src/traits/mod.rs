//! Collaborator traits consumed by the request pipeline.

mod clock;
mod connectivity;
mod refresher;

pub use clock::{Clock, SystemClock};
pub use connectivity::{AssumeOnline, Connectivity, ConnectivityState};
pub use refresher::TokenRefresher;
