//! Bounded snippet retrieval through a [`SourceHost`].
//!
//! Every fetch is gated by the path policy and degrades to `None` on any
//! failure (missing file, directory, empty file, host error). Host errors are
//! logged, never propagated: a missing snippet only narrows the oracle's view.

use tracing::{debug, warn};

use crate::core::policy::PathPolicy;
use crate::core::types::{Location, Need, Snippet};
use crate::core::window::{find_symbol_line, line_window, slice};
use crate::io::host::SourceHost;

pub struct SnippetFetcher<'a, H: SourceHost> {
    host: &'a H,
    policy: &'a PathPolicy,
}

impl<'a, H: SourceHost> SnippetFetcher<'a, H> {
    pub fn new(host: &'a H, policy: &'a PathPolicy) -> Self {
        Self { host, policy }
    }

    /// Window around `center` (or the head of the file when absent).
    pub fn fetch_by_line(
        &self,
        path: &str,
        revision: &str,
        center: Option<usize>,
        around: usize,
    ) -> Option<Snippet> {
        let text = self.read(path, revision)?;
        let lines: Vec<&str> = text.lines().collect();
        let (start, end) = line_window(lines.len(), center, around)?;
        Some(slice(path, &lines, start, end))
    }

    /// Window around the first definition (or mention) of `symbol`.
    pub fn fetch_by_symbol(
        &self,
        path: &str,
        revision: &str,
        symbol: &str,
        around: usize,
    ) -> Option<Snippet> {
        let text = self.read(path, revision)?;
        let lines: Vec<&str> = text.lines().collect();
        let Some(center) = find_symbol_line(&lines, symbol) else {
            debug!(path, symbol, "symbol not found");
            return None;
        };
        let (start, end) = line_window(lines.len(), Some(center), around)?;
        Some(slice(path, &lines, start, end))
    }

    /// Seed snippets for parsed ticket locations, in order.
    pub fn fetch_locations(
        &self,
        locations: &[Location],
        revision: &str,
        around: usize,
    ) -> Vec<Snippet> {
        locations
            .iter()
            .filter_map(|loc| {
                let center = loc.line.map(|line| line as usize);
                self.fetch_by_line(&loc.path, revision, center, around)
            })
            .collect()
    }

    /// Snippets for oracle needs. A symbol wins over a line when both are set.
    pub fn fetch_needs(&self, needs: &[Need], revision: &str, default_around: usize) -> Vec<Snippet> {
        needs
            .iter()
            .filter_map(|need| {
                let around = match need.around_lines {
                    0 => default_around,
                    n => n as usize,
                };
                match need.symbol.as_deref().filter(|s| !s.is_empty()) {
                    Some(symbol) => self.fetch_by_symbol(&need.path, revision, symbol, around),
                    None => self.fetch_by_line(
                        &need.path,
                        revision,
                        need.line.map(|line| line as usize),
                        around,
                    ),
                }
            })
            .collect()
    }

    fn read(&self, path: &str, revision: &str) -> Option<String> {
        if !self.policy.allowed(path) {
            debug!(path, "snippet path outside allow-list");
            return None;
        }
        match self.host.file_exists(path, revision) {
            Ok(true) => {}
            Ok(false) => {
                debug!(path, revision, "snippet path missing");
                return None;
            }
            Err(err) => {
                warn!(path, revision, err = %format!("{err:#}"), "snippet existence check failed");
                return None;
            }
        }
        match self.host.read_file(path, revision) {
            Ok(text) => text,
            Err(err) => {
                warn!(path, revision, err = %format!("{err:#}"), "snippet read failed");
                None
            }
        }
    }
}
