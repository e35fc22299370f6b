//! Per-position sequence-variant observations. Variants are keyed by
//! `(left, right, seq)` with qualities stripped, so the same variant seen
//! with different basecall qualities lands in one counter.

use std::collections::BTreeMap;
use std::io::Write;

use anyhow::Result;
use bv::Bits;

use crate::counting::window::ScanWindow;
use crate::model::{MappingCategory, MutationClass, Read};

#[derive(Default)]
pub struct VariantCell {
    depth: u64,
    variants: BTreeMap<(i32, i32, String), u64>,
}

pub struct VariantCounter {
    window: ScanWindow<VariantCell>,
    writer: Box<dyn Write>,
    sorted: bool,
}

impl VariantCounter {
    pub fn new(writer: Box<dyn Write>, sorted: bool) -> Self {
        VariantCounter {
            window: ScanWindow::new(),
            writer,
            sorted,
        }
    }

    pub fn ingest(&mut self, read: &Read) -> Result<()> {
        if read.mapping_category != MappingCategory::Included || read.right < read.left {
            return Ok(());
        }
        self.window.grow_to(read.right as i64);
        if self.sorted {
            for (pos, cell) in self.window.drain_until(read.left as i64) {
                self.write_row(pos, &cell)?;
            }
        }
        for p in read.left..=read.right {
            if read.depth.get_bit((p - read.left) as u64) {
                if let Some(cell) = self.window.cell_mut(p as i64) {
                    cell.depth += 1;
                }
            }
        }
        for m in &read.mutations {
            if m.tag == Some(MutationClass::NMatch) {
                continue;
            }
            if let Some(cell) = self.window.cell_mut(m.left as i64) {
                *cell
                    .variants
                    .entry((m.left, m.right, m.seq.clone()))
                    .or_insert(0) += 1;
            }
        }
        Ok(())
    }

    pub fn finish(&mut self, target_length: Option<i64>) -> Result<()> {
        if let Some(len) = target_length {
            if len > 0 {
                self.window.grow_to(len - 1);
            }
        }
        for (pos, cell) in self.window.drain_all() {
            self.write_row(pos, &cell)?;
        }
        self.writer.flush()?;
        Ok(())
    }

    fn write_row(&mut self, _pos: i64, cell: &VariantCell) -> Result<()> {
        write!(self.writer, "{}", cell.depth)?;
        for ((left, right, seq), count) in &cell.variants {
            write!(self.writer, " ({}-{}, \"{}\", {})", left, right, seq, count)?;
        }
        writeln!(self.writer)?;
        Ok(())
    }
}
