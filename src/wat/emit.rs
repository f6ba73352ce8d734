//! Per-file link accumulation and gzip emission.
//!
//! A parse run collects one WAT file's pages and links into two dedup maps,
//! then writes the sorted pipe-delimited intermediates in one pass at end of
//! scan. Outputs are written to a `.tmp` sibling and renamed into place, so
//! a crashed worker never leaves a partial intermediate behind.

use super::page::WatPage;
use crate::segment::tmp_sibling;
use crate::url::{Scheme, UrlRecord};
use flate2::write::GzEncoder;
use flate2::Compression;
use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use xxhash_rust::xxh3::xxh3_64;

/// A page row destined for the page intermediate.
#[derive(Debug, Clone)]
pub struct FilePage {
    pub host: String,
    pub path: String,
    pub raw_query: String,
    pub scheme: Scheme,
    pub title: String,
    pub ip: String,
    pub imported: String,
    pub internal_links: usize,
    pub external_links: usize,
    pub no_index: bool,
}

/// A link row destined for the link intermediate. Page columns are joined in
/// at write time through `page_hash`.
#[derive(Debug, Clone)]
pub struct FileLink {
    pub domain: String,
    pub subdomain: String,
    pub host: String,
    pub path: String,
    pub raw_query: String,
    pub scheme: Scheme,
    pub text: String,
    pub no_follow: bool,
    pub no_index: bool,
    pub imported: String,
    pub ip: String,
    pub page_hash: u64,
}

/// In-file dedup state: last write wins for both maps, collapsing repeats of
/// the same link on the same page within one WAT file.
#[derive(Debug, Default)]
pub struct LinkAccumulator {
    links: HashMap<u64, FileLink>,
    pages: HashMap<u64, FilePage>,
}

impl LinkAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a page and all of its surviving links.
    pub fn add_page(&mut self, page: &WatPage) {
        let page_hash = hash_page(&page.url);
        self.pages.insert(
            page_hash,
            FilePage {
                host: page.url.host.clone(),
                path: page.url.path.clone(),
                raw_query: page.url.raw_query.clone(),
                scheme: page.url.scheme,
                title: sanitize_field(&page.title),
                ip: page.ip.clone(),
                imported: page.imported.clone(),
                internal_links: page.internal_links,
                external_links: page.external_links,
                no_index: page.no_index,
            },
        );

        for link in &page.links {
            let link_hash = hash_link(link, &page.url);
            self.links.insert(
                link_hash,
                FileLink {
                    domain: link.domain.clone(),
                    subdomain: link.subdomain.clone(),
                    host: link.host.clone(),
                    path: link.path.clone(),
                    raw_query: link.raw_query.clone(),
                    scheme: link.scheme,
                    text: sanitize_field(&link.text),
                    no_follow: link.no_follow,
                    no_index: page.no_index,
                    imported: page.imported.clone(),
                    ip: page.ip.clone(),
                    page_hash,
                },
            );
        }
    }

    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Write the link intermediate: one 14-field line per deduped link,
    /// sorted ascending by (link domain, subdomain, path).
    pub fn write_links(&self, out: &Path) -> io::Result<()> {
        let sorted = self.sorted_links();
        write_gz_atomic(out, |writer| {
            for link in sorted {
                let page = match self.pages.get(&link.page_hash) {
                    Some(page) => page,
                    None => continue,
                };
                writeln!(
                    writer,
                    "{}|{}|{}|{}|{}|{}|{}|{}|{}|{}|{}|{}|{}|{}",
                    link.domain,
                    link.subdomain,
                    link.path,
                    link.raw_query,
                    link.scheme.code(),
                    page.host,
                    page.path,
                    page.raw_query,
                    page.scheme.code(),
                    link.text,
                    flag(link.no_follow),
                    flag(page.no_index),
                    page.imported,
                    page.ip,
                )?;
            }
            Ok(())
        })
    }

    /// Write the page intermediate: one 10-field line per deduped page.
    pub fn write_pages(&self, out: &Path) -> io::Result<()> {
        write_gz_atomic(out, |writer| {
            for page in self.pages.values() {
                writeln!(
                    writer,
                    "{}|{}|{}|{}|{}|{}|{}|{}|{}|{}",
                    page.host,
                    page.path,
                    page.raw_query,
                    page.scheme.code(),
                    page.title,
                    page.ip,
                    page.imported,
                    page.internal_links,
                    page.external_links,
                    flag(page.no_index),
                )?;
            }
            Ok(())
        })
    }

    fn sorted_links(&self) -> Vec<&FileLink> {
        let mut links: Vec<&FileLink> = self.links.values().collect();
        links.sort_by(|a, b| {
            (&a.domain, &a.subdomain, &a.path).cmp(&(&b.domain, &b.subdomain, &b.path))
        });
        links
    }
}

fn hash_page(page: &UrlRecord) -> u64 {
    let key = format!("{}{}{}", page.host, page.path, page.raw_query);
    xxh3_64(key.as_bytes())
}

fn hash_link(link: &UrlRecord, page: &UrlRecord) -> u64 {
    let key = format!(
        "{}{}{}{}{}{}",
        link.host, link.path, link.raw_query, page.host, page.path, page.raw_query
    );
    xxh3_64(key.as_bytes())
}

/// The field separator must never appear inside a field.
fn sanitize_field(value: &str) -> String {
    value.replace('|', " ")
}

fn flag(value: bool) -> &'static str {
    if value {
        "1"
    } else {
        "0"
    }
}

/// Write a gzip file through a `.tmp` sibling and rename on success.
fn write_gz_atomic<F>(out: &Path, body: F) -> io::Result<()>
where
    F: FnOnce(&mut dyn Write) -> io::Result<()>,
{
    let tmp = tmp_sibling(out);
    let result = (|| {
        let file = File::create(&tmp)?;
        let mut writer = GzEncoder::new(BufWriter::new(file), Compression::default());
        body(&mut writer)?;
        writer.finish()?.flush()
    })();

    match result {
        Ok(()) => std::fs::rename(&tmp, out),
        Err(err) => {
            let _ = std::fs::remove_file(&tmp);
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::url::UrlRecord;
    use flate2::read::GzDecoder;
    use std::io::Read;

    fn url_record(host: &str, domain: &str, path: &str) -> UrlRecord {
        UrlRecord {
            host: host.to_string(),
            domain: domain.to_string(),
            subdomain: host
                .strip_suffix(domain)
                .and_then(|p| p.strip_suffix('.'))
                .unwrap_or("")
                .to_string(),
            path: path.to_string(),
            scheme: Scheme::Https,
            ..UrlRecord::default()
        }
    }

    fn sample_page(links: Vec<UrlRecord>) -> WatPage {
        WatPage {
            url: url_record("a.com", "a.com", "/"),
            ip: "1.2.3.4".to_string(),
            imported: "2023-06-01".to_string(),
            title: "title".to_string(),
            no_index: false,
            no_follow: false,
            internal_links: 0,
            external_links: links.len(),
            links,
        }
    }

    fn read_gz_lines(path: &Path) -> Vec<String> {
        let mut content = String::new();
        GzDecoder::new(File::open(path).unwrap())
            .read_to_string(&mut content)
            .unwrap();
        content.lines().map(str::to_string).collect()
    }

    #[test]
    fn repeated_links_collapse_to_one_row() {
        let mut acc = LinkAccumulator::new();
        let link = url_record("b.com", "b.com", "/x").with_text("hi");
        acc.add_page(&sample_page(vec![link.clone(), link.clone(), link]));
        assert_eq!(acc.link_count(), 1);
        assert_eq!(acc.page_count(), 1);
    }

    #[test]
    fn link_rows_are_sorted_and_complete() {
        let tmp = tempfile::tempdir().unwrap();
        let out = tmp.path().join("00001.txt.gz");

        let mut acc = LinkAccumulator::new();
        acc.add_page(&sample_page(vec![
            url_record("z.com", "z.com", "/z"),
            url_record("b.com", "b.com", "/x").with_text("hi"),
            url_record("m.org", "m.org", "/m"),
        ]));
        acc.write_links(&out).unwrap();

        let lines = read_gz_lines(&out);
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("b.com|"));
        assert!(lines[1].starts_with("m.org|"));
        assert!(lines[2].starts_with("z.com|"));
        for line in &lines {
            assert_eq!(line.split('|').count(), 14, "line: {}", line);
        }
        assert_eq!(
            lines[0],
            "b.com||/x||2|a.com|/||2|hi|0|0|2023-06-01|1.2.3.4"
        );
    }

    #[test]
    fn pipe_in_anchor_text_becomes_space() {
        let tmp = tempfile::tempdir().unwrap();
        let out = tmp.path().join("00002.txt.gz");

        let mut acc = LinkAccumulator::new();
        acc.add_page(&sample_page(vec![
            url_record("b.com", "b.com", "/x").with_text("a|b|c")
        ]));
        acc.write_links(&out).unwrap();

        let lines = read_gz_lines(&out);
        assert_eq!(lines[0].split('|').count(), 14);
        assert!(lines[0].contains("|a b c|"));
    }

    #[test]
    fn page_rows_have_ten_fields() {
        let tmp = tempfile::tempdir().unwrap();
        let out = tmp.path().join("00003.txt.gz");

        let mut acc = LinkAccumulator::new();
        let mut page = sample_page(vec![]);
        page.title = "with | pipe".to_string();
        acc.add_page(&page);
        acc.write_pages(&out).unwrap();

        let lines = read_gz_lines(&out);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].split('|').count(), 10);
        assert!(lines[0].contains("with  pipe"));
    }

    #[test]
    fn no_tmp_file_remains_after_write() {
        let tmp = tempfile::tempdir().unwrap();
        let out = tmp.path().join("00004.txt.gz");

        let mut acc = LinkAccumulator::new();
        acc.add_page(&sample_page(vec![url_record("b.com", "b.com", "/x")]));
        acc.write_links(&out).unwrap();

        assert!(out.exists());
        assert!(!tmp_sibling(&out).exists());
    }

}
