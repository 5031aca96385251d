use crate::error::Result;
use crate::types::{Cell, FlatTable};
use csv::WriterBuilder;
use std::io::Write;

/// Writes flat records as a delimited file with a header row
pub struct FlatWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> FlatWriter<W> {
    pub fn new(writer: W, delimiter: u8) -> Self {
        FlatWriter {
            writer: WriterBuilder::new().delimiter(delimiter).from_writer(writer),
        }
    }

    pub fn write_header(&mut self, header: &[String]) -> Result<()> {
        self.writer.write_record(header)?;
        Ok(())
    }

    /// Null cells are written as empty fields
    pub fn write_record(&mut self, record: &[Cell]) -> Result<()> {
        self.writer
            .write_record(record.iter().map(|c| c.as_deref().unwrap_or("")))?;
        Ok(())
    }

    pub fn write_table(&mut self, table: &FlatTable) -> Result<()> {
        self.write_header(&table.header)?;
        for record in &table.records {
            self.write_record(record)?;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_table() {
        let table = FlatTable {
            header: vec!["name".into(), "street_address".into(), "locality".into()],
            records: vec![
                vec![Some("North".into()), Some("1 Main St, Suite 2".into()), None],
                vec![Some("South".into()), None, Some("Reno".into())],
            ],
        };

        let mut buffer = Vec::new();
        {
            let mut writer = FlatWriter::new(&mut buffer, b',');
            writer.write_table(&table).unwrap();
            writer.flush().unwrap();
        }

        let output = String::from_utf8(buffer).unwrap();
        assert_eq!(
            output,
            "name,street_address,locality\nNorth,\"1 Main St, Suite 2\",\nSouth,,Reno\n"
        );
    }
}
