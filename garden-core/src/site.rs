//! Output layout.
//!
//! The site is flat: the start page becomes `index.html` and every other
//! page `<id>.html`, so a relative href works from any page. A non-start
//! page whose id is `index` is written to `_index.html`; ids never start
//! with `_`, so that name cannot collide.

use std::path::PathBuf;

use crate::vault::PageId;

pub fn page_out_path(id: &PageId, start: &PageId) -> PathBuf {
    if id == start {
        PathBuf::from("index.html")
    } else if id.as_str() == "index" {
        PathBuf::from("_index.html")
    } else {
        PathBuf::from(format!("{}.html", id))
    }
}

pub fn page_url(id: &PageId, start: &PageId) -> String {
    page_out_path(id, start).to_string_lossy().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_out_paths() {
        let home = PageId::new("Home").unwrap();
        let about = PageId::new("About Me").unwrap();

        assert_eq!(page_out_path(&home, &home), PathBuf::from("index.html"));
        assert_eq!(page_out_path(&about, &home), PathBuf::from("about-me.html"));
        assert_eq!(page_url(&about, &home), "about-me.html");

        let index = PageId::new("Index").unwrap();
        assert_eq!(page_out_path(&index, &index), PathBuf::from("index.html"));
        assert_eq!(page_out_path(&index, &home), PathBuf::from("_index.html"));
    }
}
