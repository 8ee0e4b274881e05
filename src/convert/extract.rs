//! Attachment extraction: write MIME parts to disk and index them.

use std::path::Path;

use crate::error::{ConvertError, Result};
use crate::model::attachment::AttachmentIndex;
use crate::model::mail::Mail;

use super::report::{Report, Warning};
use super::short_hash;

/// Write every attachment of `mail` under `dir` and build the dual-key
/// lookup table.
///
/// File names follow `{hash(source)}.a{index}.{basename}`: the source-path
/// hash keeps messages apart, the ordinal keeps sibling attachments apart,
/// and reruns on the same input produce identical paths. A failed write
/// skips that attachment only; the directory being uncreatable is fatal.
pub fn extract_attachments(
    mail: &Mail,
    source: &Path,
    dir: &Path,
    verbose: bool,
    report: &mut Report,
) -> Result<AttachmentIndex> {
    let mut index = AttachmentIndex::default();
    if mail.attachments.is_empty() {
        return Ok(index);
    }

    std::fs::create_dir_all(dir).map_err(|e| ConvertError::CreateDir {
        path: dir.to_path_buf(),
        source: e,
    })?;

    let message_key = short_hash(&source.to_string_lossy());

    for (i, att) in mail.attachments.iter().enumerate() {
        if verbose {
            tracing::info!(filename = %att.filename, "Extracting attachment");
        }

        // Attachment names can carry path separators; only the final
        // component lands in the output name.
        let basename = Path::new(&att.filename)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "attachment".to_string());
        let path = dir.join(format!("{message_key}.a{i}.{basename}"));

        if let Err(e) = std::fs::write(&path, &att.data) {
            report.warn(Warning::AttachmentWrite {
                filename: att.filename.clone(),
                cause: e.to_string(),
            });
            continue;
        }

        if let Some(cid) = &att.content_id {
            index.insert(cid.clone(), &path);
        }
        index.insert(att.filename.clone(), &path);
    }

    Ok(index)
}
