//! Work-progress reporting. Grounded on the teacher's
//! `AtomicCountRead`/`AtomicCountWrite` (counting wrappers used to report
//! byte counts mid-copy), `spinner()`/`truncate_path()`, and `rcu.rs`'s
//! shared "current progress" cell -- simplified here to a `Mutex` since
//! the shared state is a single path, not a whole data structure (see
//! DESIGN.md's dependency ledger for why `crossbeam-epoch` was dropped).

use std::io::{self, Read, Write};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::Duration;

use byte_unit::Byte;
use camino::{Utf8Path, Utf8PathBuf};
use console::Term;
use unicode_segmentation::UnicodeSegmentation;

/// A `Read` wrapper that adds every byte read through it to a shared
/// counter -- used on both the encoder's stdin (input bytes) and stdout
/// (output bytes) per §4.7.
pub struct CountingReader<'a, R> {
    inner: R,
    count: &'a AtomicU64,
}

impl<'a, R: Read> CountingReader<'a, R> {
    pub fn new(inner: R, count: &'a AtomicU64) -> Self {
        Self { inner, count }
    }
}

impl<R: Read> Read for CountingReader<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.count.fetch_add(n as u64, Ordering::Relaxed);
        Ok(n)
    }
}

/// A `Write` wrapper that adds every byte written through it to a shared
/// counter.
pub struct CountingWriter<'a, W> {
    inner: W,
    count: &'a AtomicU64,
}

impl<'a, W: Write> CountingWriter<'a, W> {
    pub fn new(inner: W, count: &'a AtomicU64) -> Self {
        Self { inner, count }
    }
}

impl<W: Write> Write for CountingWriter<'_, W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.count.fetch_add(n as u64, Ordering::Relaxed);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// The path currently being walked/hashed, shared between the worker
/// thread doing the work and a reporting thread drawing a progress line.
#[derive(Default)]
pub struct CurrentPath(Mutex<Utf8PathBuf>);

impl CurrentPath {
    pub fn set(&self, path: &Utf8Path) {
        *self.0.lock().unwrap() = path.to_owned();
    }

    pub fn get(&self) -> Utf8PathBuf {
        self.0.lock().unwrap().clone()
    }
}

/// A periodic progress line drawn from a worker thread's `CurrentPath`,
/// via `std::thread::scope` rather than a polling async task (the
/// teacher's `ProgressTask` used `tokio::spawn` + `Notify`; this crate has
/// no async runtime anywhere, matching its newer-style files).
pub fn report_while<F, T>(current: &CurrentPath, work: F) -> T
where
    F: FnOnce() -> T,
{
    let stop = Mutex::new(false);
    thread::scope(|scope| {
        scope.spawn(|| {
            let term = Term::stderr();
            let mut i = 0usize;
            loop {
                if *stop.lock().unwrap() {
                    break;
                }
                let path = current.get();
                if !path.as_str().is_empty() {
                    let _ = term.clear_line();
                    let _ = write!(
                        &term,
                        "{} {}",
                        spinner(i),
                        truncate_path(&path, &term)
                    );
                }
                i += 1;
                thread::sleep(Duration::from_millis(100));
            }
            let _ = term.clear_line();
        });
        let result = work();
        *stop.lock().unwrap() = true;
        result
    })
}

pub fn spinner(i: usize) -> char {
    match i % 4 {
        0 => '|',
        1 => '/',
        2 => '-',
        3 => '\\',
        _ => unreachable!(),
    }
}

pub fn nice_size(bytes: u64) -> String {
    Byte::from_u64(bytes).get_appropriate_unit(byte_unit::UnitType::Binary).to_string()
}

pub fn truncate_path(p: &Utf8Path, term: &Term) -> String {
    let w = term.size().1 as usize;
    if w <= 3 {
        return ".".repeat(w);
    }
    let syms: Vec<_> = p.as_str().graphemes(true).collect();
    if syms.len() > w {
        let back: Vec<_> = p
            .file_name()
            .map(|n| n.graphemes(true).collect())
            .unwrap_or_default();
        if back.len() >= (w - 3) {
            format!("...{}", back[back.len() - w + 3..].concat())
        } else {
            let front = &syms[..(w - back.len() - 3)];
            format!("{}...{}", front.concat(), back.concat())
        }
    } else {
        p.to_string()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn counting_reader_tallies_bytes() {
        let count = AtomicU64::new(0);
        let mut r = CountingReader::new(b"hello world".as_slice(), &count);
        let mut buf = Vec::new();
        io::copy(&mut r, &mut buf).unwrap();
        assert_eq!(count.load(Ordering::Relaxed), 11);
    }

    #[test]
    fn current_path_is_shared() {
        let current = CurrentPath::default();
        current.set(Utf8Path::new("a/b.txt"));
        assert_eq!(current.get(), Utf8PathBuf::from("a/b.txt"));
    }
}
