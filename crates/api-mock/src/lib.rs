//! Primes a [MockServer](https://www.mock-server.com) instance so it answers
//! like the Hetzner Cloud metadata service and public API.
//!
//! ```text
//!                 reset           ┌──────────────────────┐
//!   Registrar ───────────────────►│                      │
//!       │       register (x7)     │      MockServer      │◄──── node under test
//!       ├════════════════════════►│  /mockserver/*       │      GET 169.254.169.254/...
//!       │      (concurrently)     │                      │      GET api.hetzner.cloud/...
//!   fixtures/                     └──────────────────────┘
//! ```
pub mod error;
pub mod instance;
pub mod probe;
pub mod registrar;
pub mod rule;

pub use error::{RegistrarError, RegistrarResult};
pub use instance::InstanceId;
pub use probe::probe;
pub use registrar::{Registrar, RegistrationReport};
pub use rule::{hcloud_rules, ResponseBody, Rule};
