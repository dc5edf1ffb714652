//! Periodic status display
//!
//! The supervision loop prints one fixed-width table row per refresh so a
//! long-running crawl can be eyeballed in a terminal. Session columns count
//! work done by this process; catalog columns reflect the shared store.

use crate::storage::CatalogCounts;
use std::fmt;

/// One row of the status table
#[derive(Debug)]
pub struct StatusRow {
    /// Pages fetched by this session
    pub session_pages: u64,

    /// Images cached by this session
    pub session_images: u64,

    /// Current catalog aggregates
    pub counts: CatalogCounts,
}

const COLUMNS: &[&str] = &[
    "Crawled pages",
    "Crawled images",
    "Pending pages",
    "Visited pages",
    "Visited images",
    "Cached images",
];

/// Width of every cell, sized to the longest column title
const CELL: usize = 14;

/// Prints the table header
pub fn print_header() {
    let mut line = String::from("|");
    for title in COLUMNS {
        line.push_str(&format!(" {:<CELL$} |", title));
    }
    println!("{}", line);
    println!("{}", "-".repeat(line.len()));
}

impl fmt::Display for StatusRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cells: [u64; 6] = [
            self.session_pages,
            self.session_images,
            self.counts.pending_pages,
            self.counts.visited_pages,
            self.counts.resolved_images,
            self.counts.cached_images,
        ];
        write!(f, "|")?;
        for value in cells {
            write!(f, " {:<CELL$} |", value)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_has_one_cell_per_column() {
        let row = StatusRow {
            session_pages: 12,
            session_images: 3,
            counts: CatalogCounts {
                pending_pages: 40,
                visited_pages: 12,
                resolved_images: 5,
                cached_images: 3,
            },
        };
        let rendered = row.to_string();
        assert_eq!(rendered.matches('|').count(), COLUMNS.len() + 1);
        assert!(rendered.contains(" 40 "));
        assert!(rendered.contains(" 12 "));
    }
}
