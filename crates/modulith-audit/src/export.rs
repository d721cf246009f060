//! Paged JSON lines export.

use std::io::Write;

use modulith_core::store::EventStore;

use crate::error::AppError;

/// Writes every event in `store`, in global order, to `out` as one JSON
/// record per line. Pages of `page_size` events are fetched until a short
/// page signals the end of the log. Returns the number of events written.
///
/// # Errors
///
/// Returns `AppError::Config` for a non-positive `page_size`, and any store,
/// serialization or output failure.
pub async fn export_jsonl<W: Write>(
    store: &dyn EventStore,
    page_size: i64,
    out: &mut W,
) -> Result<u64, AppError> {
    let limit = usize::try_from(page_size)
        .ok()
        .filter(|&limit| limit > 0)
        .ok_or_else(|| AppError::Config(format!("page size must be at least 1, got {page_size}")))?;

    let mut offset = 0_i64;
    let mut exported = 0_u64;
    loop {
        let page = store.get_events_paginated(offset, page_size).await?;
        for event in &page {
            serde_json::to_writer(&mut *out, event)?;
            out.write_all(b"\n")?;
            exported += 1;
        }

        tracing::debug!(offset, fetched = page.len(), "exported page");
        if page.len() < limit {
            break;
        }
        offset += page_size;
    }

    Ok(exported)
}
