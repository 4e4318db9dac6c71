//! Plain HTTP fetch backend.
//!
//! Streams the response body to a staging file while enforcing the size
//! cap and computing the content hash incrementally, then renames into
//! place. A cap overflow mid-stream drops the staging file; the target is
//! never touched by a failed fetch.

use futures_util::StreamExt;
use log::debug;
use md5::{Digest, Md5};
use tokio::io::AsyncWriteExt;

use super::links::extract_candidate_links;
use super::paywall::looks_like_paywall;
use super::save::{self, FinalizeResult};
use super::types::{FetchOutcome, FetchRequest};
use super::ContentFetcher;
use crate::utils::constants::LINK_SCAN_PREFIX_BYTES;

/// Fetcher backed by a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    #[must_use]
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl ContentFetcher for HttpFetcher {
    async fn fetch(&self, request: &FetchRequest) -> FetchOutcome {
        let response = match self
            .client
            .get(&request.url)
            .timeout(request.timeout)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                let status = e.status().map(|s| s.as_u16());
                return FetchOutcome::failed_request(format!("request failed: {e}"), status);
            }
        };

        let http_status = response.status().as_u16();
        if !response.status().is_success() {
            return FetchOutcome::failed_request(
                format!("HTTP status {http_status}"),
                Some(http_status),
            );
        }

        // Pre-check the advertised length; the running counter below
        // still guards against servers that lie or omit it.
        if let Some(length) = response.content_length()
            && length > request.max_size
        {
            return FetchOutcome::failed_request(
                format!(
                    "content length {length} exceeds limit of {} bytes",
                    request.max_size
                ),
                Some(http_status),
            );
        }

        let staged = match save::staging_file(&request.target_path) {
            Ok(file) => file,
            Err(e) => return FetchOutcome::failed_internal(format!("{e:#}")),
        };
        // Chunks go through an async handle on the staged path so body
        // writes never block the worker's event-loop thread.
        let mut staged_writer = match tokio::fs::OpenOptions::new()
            .write(true)
            .open(staged.path())
            .await
        {
            Ok(file) => file,
            Err(e) => {
                return FetchOutcome::failed_internal(format!(
                    "failed to open staged file for writing: {e}"
                ));
            }
        };

        let mut hasher = Md5::new();
        let mut total_bytes: u64 = 0;
        let mut scan_prefix: Vec<u8> = Vec::new();
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    return FetchOutcome::failed_request(
                        format!("body read failed: {e}"),
                        Some(http_status),
                    );
                }
            };

            total_bytes += chunk.len() as u64;
            if total_bytes > request.max_size {
                // Staging file is dropped (and removed) here; no partial
                // file appears at the target path.
                debug!(
                    target: "docmirror::fetch",
                    "aborting {}: exceeded {} bytes mid-stream",
                    request.url, request.max_size
                );
                return FetchOutcome::failed_request(
                    format!("download exceeded size limit of {} bytes", request.max_size),
                    Some(http_status),
                );
            }

            hasher.update(&chunk);
            if scan_prefix.len() < LINK_SCAN_PREFIX_BYTES {
                let take = (LINK_SCAN_PREFIX_BYTES - scan_prefix.len()).min(chunk.len());
                scan_prefix.extend_from_slice(&chunk[..take]);
            }
            if let Err(e) = staged_writer.write_all(&chunk).await {
                return FetchOutcome::failed_internal(format!(
                    "failed to write staged content: {e}"
                ));
            }
        }

        if let Err(e) = staged_writer.flush().await {
            return FetchOutcome::failed_internal(format!("failed to flush staged content: {e}"));
        }
        drop(staged_writer);

        let md5_hex = hex::encode(hasher.finalize());
        let scanned = String::from_utf8_lossy(&scan_prefix);

        if looks_like_paywall(&scanned) {
            return FetchOutcome::failed_paywall(
                "content matched paywall/login heuristics",
                Some(http_status),
            );
        }

        match save::finalize(staged, &request.target_path, request.overwrite) {
            Ok(FinalizeResult::Written(path)) => FetchOutcome::success(
                path,
                md5_hex,
                Some(http_status),
                extract_candidate_links(&scanned),
            ),
            Ok(FinalizeResult::SkippedExisting(path)) => FetchOutcome::skipped_existing(path),
            Err(e) => FetchOutcome::failed_internal(format!("{e:#}")),
        }
    }
}
