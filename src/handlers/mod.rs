// handlers/mod.rs - 3-Tier Handler Architecture
//
// Public (tenant resolved, no auth) → Protected (access token) → Elevated (ADMIN role)
//
// Every tier runs behind tenant resolution; the tiers differ only in the
// auth layers `app.rs` stacks on top.

pub mod elevated; // Tier 3: ADMIN role required (/api/root/*)
pub mod extract;
pub mod protected; // Tier 2: access token required (/api/*)
pub mod public; // Tier 1: no authentication (/auth/*, /api/tenant)

pub use extract::{ValidJson, ValidPath, ValidQuery};
