//! Per-position mutation-class counts and depth columns, emitted as a
//! tab-separated table with one row per reference position.

use std::io::Write;

use anyhow::Result;
use bv::Bits;
use vec_map::VecMap;

use crate::counting::window::ScanWindow;
use crate::model::{MappingCategory, MutationClass, Read};

#[derive(Default)]
pub struct MutationCell {
    counts: VecMap<u64>,
    ambig_counts: VecMap<u64>,
    read_depth: u64,
    effective_depth: u64,
    off_target_mapped_depth: u64,
    low_mapq_mapped_depth: u64,
    mapped_depth: VecMap<u64>,
}

pub struct MutationCounter {
    window: ScanWindow<MutationCell>,
    writer: csv::Writer<Box<dyn Write>>,
    separate_ambig_counts: bool,
    /// Number of mapped-depth columns: one per primer pair, or one generic.
    mapped_columns: usize,
    sorted: bool,
}

impl MutationCounter {
    pub fn new(
        out: Box<dyn Write>,
        separate_ambig_counts: bool,
        primer_pairs: usize,
        sorted: bool,
    ) -> Result<Self> {
        let writer = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .from_writer(out);
        let mut counter = MutationCounter {
            window: ScanWindow::new(),
            writer,
            separate_ambig_counts,
            mapped_columns: primer_pairs.max(1),
            sorted,
        };
        counter.write_header()?;
        Ok(counter)
    }

    fn write_header(&mut self) -> Result<()> {
        let mut header = Vec::new();
        for class in MutationClass::all() {
            header.push(class.to_string());
            if self.separate_ambig_counts {
                header.push(format!("{}_ambig", class));
            }
        }
        header.push("read_depth".to_owned());
        header.push("effective_depth".to_owned());
        header.push("off_target_mapped_depth".to_owned());
        header.push("low_mapq_mapped_depth".to_owned());
        if self.mapped_columns == 1 {
            header.push("mapped_depth".to_owned());
        } else {
            for i in 0..self.mapped_columns {
                header.push(format!("primer_pair_{}_mapped_depth", i));
            }
        }
        self.writer.write_record(&header)?;
        Ok(())
    }

    pub fn ingest(&mut self, read: &Read) -> Result<()> {
        if read.right < read.left {
            return Ok(());
        }
        self.window.grow_to(read.right as i64);
        if self.sorted {
            for (pos, cell) in self.window.drain_until(read.left as i64) {
                self.write_row(pos, &cell)?;
            }
        }

        match read.mapping_category {
            MappingCategory::Included => {
                for p in read.left..=read.right {
                    let i = (p - read.left) as u64;
                    if let Some(cell) = self.window.cell_mut(p as i64) {
                        cell.read_depth += 1;
                        if read.depth.get_bit(i) {
                            cell.effective_depth += 1;
                        }
                        if read.mapped_depth.get_bit(i) {
                            let column = if self.mapped_columns > 1 && read.primer_pair >= 0 {
                                read.primer_pair as usize
                            } else {
                                0
                            };
                            *cell.mapped_depth.entry(column).or_insert(0) += 1;
                        }
                    }
                }
                for m in &read.mutations {
                    let tag = match m.tag {
                        Some(tag) => tag,
                        None => continue,
                    };
                    if let Some(cell) = self.window.cell_mut((m.right - 1) as i64) {
                        *cell.counts.entry(tag.ordinal()).or_insert(0) += 1;
                        if self.separate_ambig_counts && m.ambig {
                            *cell.ambig_counts.entry(tag.ordinal()).or_insert(0) += 1;
                        }
                    }
                }
            }
            MappingCategory::LowMapq => {
                for p in read.left..=read.right {
                    if let Some(cell) = self.window.cell_mut(p as i64) {
                        cell.low_mapq_mapped_depth += 1;
                    }
                }
            }
            MappingCategory::OffTarget => {
                for p in read.left..=read.right {
                    let i = (p - read.left) as u64;
                    if read.mapped_depth.get_bit(i) {
                        if let Some(cell) = self.window.cell_mut(p as i64) {
                            cell.off_target_mapped_depth += 1;
                        }
                    }
                }
            }
            MappingCategory::Unmapped => {}
        }
        Ok(())
    }

    /// Emit all remaining cells, padding to `target_length` when given so
    /// that output is fixed-length irrespective of coverage.
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

    fn write_row(&mut self, _pos: i64, cell: &MutationCell) -> Result<()> {
        let mut row = Vec::new();
        for class in MutationClass::all() {
            let ord = class.ordinal();
            row.push(cell.counts.get(ord).cloned().unwrap_or(0).to_string());
            if self.separate_ambig_counts {
                row.push(cell.ambig_counts.get(ord).cloned().unwrap_or(0).to_string());
            }
        }
        row.push(cell.read_depth.to_string());
        row.push(cell.effective_depth.to_string());
        row.push(cell.off_target_mapped_depth.to_string());
        row.push(cell.low_mapq_mapped_depth.to_string());
        for column in 0..self.mapped_columns {
            row.push(cell.mapped_depth.get(column).cloned().unwrap_or(0).to_string());
        }
        self.writer.write_record(&row)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bv::{BitVec, BitsMut};
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn included_read(left: i32, seq_len: usize) -> Read {
        let mut read = Read::new("r", left, left + seq_len as i32 - 1);
        read.mapped_depth = BitVec::new_fill(true, seq_len as u64);
        read.depth = BitVec::new_fill(true, seq_len as u64);
        read
    }

    fn rows(buf: &SharedBuf) -> Vec<String> {
        String::from_utf8(buf.0.lock().unwrap().clone())
            .unwrap()
            .lines()
            .map(|l| l.to_owned())
            .collect()
    }

    #[test]
    fn test_header_and_padding() {
        let buf = SharedBuf::default();
        let mut counter =
            MutationCounter::new(Box::new(buf.clone()), false, 0, true).unwrap();
        counter.finish(Some(4)).unwrap();
        let lines = rows(&buf);
        assert_eq!(lines.len(), 5);
        assert!(lines[0].starts_with("A-\tT-\tG-\tC-\t-A\t"));
        assert!(lines[0].ends_with("read_depth\teffective_depth\toff_target_mapped_depth\tlow_mapq_mapped_depth\tmapped_depth"));
    }

    #[test]
    fn test_sorted_mode_emits_prefix() {
        let buf = SharedBuf::default();
        let mut counter =
            MutationCounter::new(Box::new(buf.clone()), false, 0, true).unwrap();
        for left in &[10, 20, 30] {
            counter.ingest(&included_read(*left, 5)).unwrap();
        }
        counter.writer.flush().unwrap();
        // positions 0..29 are out of the window; 0..19 already written
        assert_eq!(rows(&buf).len(), 1 + 30);
        assert_eq!(counter.window.target_pos(), 30);
    }

    #[test]
    fn test_low_mapq_contributes_mapped_depth_only() {
        let buf = SharedBuf::default();
        let mut counter =
            MutationCounter::new(Box::new(buf.clone()), false, 0, false).unwrap();
        let mut read = included_read(0, 4);
        read.mapping_category = MappingCategory::LowMapq;
        let mut m = crate::model::Mutation::new(0, 2, "C", "H");
        m.tag = Some(MutationClass::MismatchAC);
        read.mutations.push(m);
        counter.ingest(&read).unwrap();
        counter.finish(None).unwrap();
        let lines = rows(&buf);
        let first: Vec<&str> = lines[1].split('\t').collect();
        // all class columns zero
        assert!(first[..27].iter().all(|v| *v == "0"));
        // read_depth, effective_depth zero; low_mapq column 1
        assert_eq!(first[27], "0");
        assert_eq!(first[28], "0");
        assert_eq!(first[30], "1");
    }

    #[test]
    fn test_mutation_attributed_to_single_column() {
        let buf = SharedBuf::default();
        let mut counter =
            MutationCounter::new(Box::new(buf.clone()), false, 0, false).unwrap();
        let mut read = included_read(0, 6);
        read.count.set_bit(3, true);
        let mut m = crate::model::Mutation::new(2, 4, "G", "H");
        m.tag = Some(MutationClass::MismatchAG);
        read.mutations.push(m);
        counter.ingest(&read).unwrap();
        counter.finish(None).unwrap();
        let lines = rows(&buf);
        let ag = MutationClass::MismatchAG.ordinal();
        for (i, line) in lines[1..].iter().enumerate() {
            let fields: Vec<&str> = line.split('\t').collect();
            let expected = if i == 3 { "1" } else { "0" };
            assert_eq!(fields[ag], expected, "row {}", i);
        }
    }
}
