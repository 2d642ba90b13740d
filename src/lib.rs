pub mod app_state;
pub mod constants;
pub mod seerr;

pub use seerr::client::SeerrClient;
pub use seerr::dispatch::{dispatch, GatewayRequest, GatewayResponse};
pub use seerr::upstream::Credentials;
