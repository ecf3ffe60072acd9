//! Paging over a [`RankedDirectory`].
//!
//! A [`Page`] is a window of at most `page_size` servers plus the
//! navigation actions valid from it.  Out-of-range indices are not
//! clamped: they simply yield an empty window.

use std::fmt::Write;

use log::warn;

use crate::aggregator::RankedDirectory;
use crate::types::ServiceInstance;

const TOKEN_PREFIX: &str = "page:";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Page<'a> {
    pub index: usize,
    pub items: &'a [ServiceInstance],
    pub has_prev: bool,
    pub has_next: bool,
    pub total: usize,
    page_size: usize,
}

/// Opaque navigation token carrying the destination page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageToken(pub usize);

impl PageToken {
    pub fn encode(self) -> String {
        format!("{}{}", TOKEN_PREFIX, self.0)
    }

    /// Decodes callback data.
    ///
    /// Returns `None` when the data is not a navigation token at all.  A
    /// token with a malformed index falls back to the first page.
    pub fn decode(data: &str) -> Option<Self> {
        let index = data.strip_prefix(TOKEN_PREFIX)?;
        match index.parse::<usize>() {
            Ok(index) => Some(PageToken(index)),
            Err(e) => {
                warn!("Malformed page token {:?} ({}), showing first page", data, e);
                Some(PageToken(0))
            }
        }
    }
}

/// A button to render next to a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavAction {
    pub label: &'static str,
    pub token: PageToken,
}

pub fn paginate(directory: &RankedDirectory, index: usize, page_size: usize) -> Page<'_> {
    let total = directory.len();
    let items = index
        .checked_mul(page_size)
        .filter(|start| *start < total)
        .map(|start| {
            let end = start.saturating_add(page_size).min(total);
            &directory[start..end]
        })
        .unwrap_or(&[]);

    let next_start = index.saturating_add(1).saturating_mul(page_size);
    Page {
        index,
        items,
        has_prev: index > 0,
        has_next: next_start < total,
        total,
        page_size,
    }
}

impl Page<'_> {
    pub fn page_count(&self) -> usize {
        if self.page_size == 0 {
            return 0;
        }
        self.total.div_ceil(self.page_size)
    }

    pub fn navigation(&self) -> Vec<NavAction> {
        let mut actions = Vec::with_capacity(2);
        if self.has_prev {
            actions.push(NavAction {
                label: "⬅️ Precedenti",
                token: PageToken(self.index - 1),
            });
        }
        if self.has_next {
            actions.push(NavAction {
                label: "Successivi ➡️",
                token: PageToken(self.index + 1),
            });
        }
        actions
    }

    /// Markdown text for this page.
    pub fn render(&self) -> String {
        if self.items.is_empty() {
            return "Nessun server disponibile al momento 😔".to_string();
        }

        let mut msg = format!(
            "Eccola la lista dei server disponibili (pagina {}/{}):\n\n",
            self.index + 1,
            self.page_count()
        );
        for server in self.items {
            render_instance(&mut msg, server);
        }
        msg
    }
}

fn render_instance(out: &mut String, server: &ServiceInstance) {
    // Writing to a String cannot fail.
    let _ = writeln!(out, "{} [{}]({})", server.kind.icon(), server.name, server.url);
    let _ = writeln!(
        out,
        "❤️ *Offerto da*: [{}]({})",
        server.sponsor_name, server.sponsor_url
    );
    if let Some(metrics) = server.load_metrics {
        let percent = (metrics.cpu_usage * 100.0).floor() as u64;
        let _ = writeln!(out, "👥 *Utenti connessi*: {}", metrics.user_count);
        let _ = writeln!(out, "📈 *Carico*: {}%", percent);
    }
    out.push('\n');
}
