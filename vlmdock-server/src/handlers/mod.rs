//! HTTP request handlers.
//!
//! | Module   | Routes                                 |
//! |----------|----------------------------------------|
//! | `common` | `/health`, `/v1/stats`, `/actions`     |
//! | `infer`  | `/infer`                               |

pub mod common;
pub mod infer;
