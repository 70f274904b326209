//! Human-readable announcement texts (Discord markdown).

use crate::types::{format_sui, short_id, Mist, TransferRequest};

/// Build the explorer link for `digest` from a `{digest}` template.
pub fn explorer_link(template: &str, digest: &str) -> Option<String> {
    if digest.starts_with("dry-run-") {
        return None;
    }
    Some(template.replace("{digest}", digest))
}

/// Announced once the loop starts.
pub fn started(address: &str, destination: &str, threshold: Mist, dry_run: bool) -> String {
    let mode = if dry_run { " (dry run)" } else { "" };
    format!(
        "🟢 **Sweeper online**{mode}\n\
         Watching `{}` → `{}`\n\
         Threshold: `{}`",
        short_id(address),
        short_id(destination),
        format_sui(threshold),
    )
}

/// Announced when the observed total changes.
pub fn balance_changed(address: &str, total: Mist) -> String {
    format!(
        "💰 Wallet `{}`\nBalance: `{}`",
        short_id(address),
        format_sui(total)
    )
}

/// Announced for each successful transfer.
pub fn sweep_succeeded(
    from: &str,
    request: &TransferRequest,
    digest: &str,
    explorer_template: &str,
) -> String {
    let source = request
        .gas_payer()
        .map(|u| short_id(&u.id))
        .unwrap_or_default();
    let mut msg = format!(
        "🚨 **SUI sweep** 🚨\n\
         Moved `{}` from object `{source}`\n\
         From: `{}`\n\
         To: `{}`\n\
         TX: `{digest}`",
        format_sui(request.amount),
        short_id(from),
        short_id(&request.destination),
    );
    if let Some(link) = explorer_link(explorer_template, digest) {
        msg.push('\n');
        msg.push_str(&link);
    }
    msg
}

/// Announced for each failed transfer.
pub fn sweep_failed(request: &TransferRequest, cause: &str) -> String {
    let source = request
        .gas_payer()
        .map(|u| short_id(&u.id))
        .unwrap_or_default();
    format!(
        "❌ Sweep of `{}` from object `{source}` failed: {cause}",
        format_sui(request.amount)
    )
}
