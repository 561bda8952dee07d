/*!
 * Request context extractors
 *
 * Responsibility:
 * - pipeline の各 stage が request extensions に置いた値 (tenant / claims / transaction) を handler に渡す
 * - 値そのものの書き込みは middleware::context だけが行う
 *
 * Public API:
 * - Tenant
 * - Authenticated
 * - TenantTx
 */

mod core;

pub use core::{Authenticated, Tenant, TenantTx};
