use anyhow::{bail, Context};
use eventdesk_orders::{
    attach_immutable_order_hash, patch_order_court_fields, rehash_order_after_admin_patch,
    verify_order_hash, AdminPatch, CourtPatch,
};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::{OrderCommand, OrderFile};

pub fn dispatch(cmd: OrderCommand) -> anyhow::Result<()> {
    match cmd {
        OrderCommand::Seal(target) => {
            let sealed = attach_immutable_order_hash(read_json(&target.file)?)?;
            emit(&target, &sealed)
        }
        OrderCommand::Verify { file } => {
            let verification = verify_order_hash(&read_json(&file)?);
            println!("{}", serde_json::to_string_pretty(&verification)?);
            if let Some(reason) = verification.reason {
                bail!("order {file} failed verification: {reason}");
            }
            Ok(())
        }
        OrderCommand::PatchCourt {
            target,
            court_name,
            court_no,
            overwrite,
        } => {
            let patch = CourtPatch {
                court_name,
                court_no,
                overwrite,
            };
            let patched = patch_order_court_fields(read_json(&target.file)?, &patch)?;
            // The seal is now stale until `order reseal` runs.
            warn!(file = %target.file, "order patched; re-seal it before use");
            emit(&target, &patched)
        }
        OrderCommand::Reseal { target, by, note } => {
            let patch = AdminPatch {
                patched_by: by,
                patch_note: note,
            };
            let resealed = rehash_order_after_admin_patch(read_json(&target.file)?, &patch)?;
            emit(&target, &resealed)
        }
        OrderCommand::VerifyAll { file } => verify_all(&file),
    }
}

fn verify_all(file: &str) -> anyhow::Result<()> {
    let orders = match read_json(file)? {
        Value::Array(orders) => orders,
        other => vec![other],
    };

    let mut failed = 0usize;
    let report: Vec<Value> = orders
        .iter()
        .enumerate()
        .map(|(idx, order)| {
            let verification = verify_order_hash(order);
            if !verification.ok {
                failed += 1;
            }
            json!({
                "index": idx,
                "id": order.get("id").cloned().unwrap_or(Value::Null),
                "verification": verification,
            })
        })
        .collect();
    println!("{}", serde_json::to_string_pretty(&report)?);

    info!(total = orders.len(), failed, "orders verified");
    if failed > 0 {
        bail!("{failed} of {} orders failed verification", orders.len());
    }
    Ok(())
}

fn read_json(path: &str) -> anyhow::Result<Value> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("reading {path}"))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing {path}"))
}

fn emit(target: &OrderFile, order: &Value) -> anyhow::Result<()> {
    let rendered = serde_json::to_string_pretty(order)?;
    if target.in_place {
        std::fs::write(&target.file, rendered + "\n")
            .with_context(|| format!("writing {}", target.file))?;
        info!(file = %target.file, "order written");
    } else {
        println!("{rendered}");
    }
    Ok(())
}
