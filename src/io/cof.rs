use crate::core::geomagnetic::{GaussCoefficient, SphericalHarmonicModel};
use crate::types::{VelprofError, VelprofResult};
use std::fs;
use std::path::Path;

/// Reader for `.COF` Gauss coefficient tables (WMM and IGRF distributions).
///
/// The first non-blank line is `epoch name date`, followed by one
/// `n m g h dg dh` row per coefficient. A line starting with `9999` ends the
/// table.
pub struct CofReader;

impl CofReader {
    /// Read and parse a coefficient file
    pub fn read_file<P: AsRef<Path>>(path: P) -> VelprofResult<SphericalHarmonicModel> {
        let path_ref = path.as_ref();
        log::info!("Reading geomagnetic coefficients: {}", path_ref.display());
        let contents = fs::read_to_string(path_ref)?;
        Self::parse(&contents)
    }

    /// Parse coefficient text
    pub fn parse(contents: &str) -> VelprofResult<SphericalHarmonicModel> {
        let mut lines = contents
            .lines()
            .enumerate()
            .map(|(i, line)| (i + 1, line.trim()))
            .filter(|(_, line)| !line.is_empty());

        let (header_line, header) = lines
            .next()
            .ok_or_else(|| VelprofError::Coefficients("empty coefficient file".to_string()))?;
        let (epoch, name) = Self::parse_header(header_line, header)?;

        let mut coefficients = Vec::new();
        let mut terminated = false;
        for (line_no, line) in lines {
            if line.starts_with("9999") {
                terminated = true;
                break;
            }
            coefficients.push(Self::parse_row(line_no, line)?);
        }

        if !terminated {
            log::warn!("Coefficient table for {} has no 9999 terminator", name);
        }
        log::debug!("Parsed {} coefficients for {}", coefficients.len(), name);

        SphericalHarmonicModel::new(&name, epoch, &coefficients)
    }

    fn parse_header(line_no: usize, line: &str) -> VelprofResult<(f64, String)> {
        let mut fields = line.split_whitespace();
        let epoch = fields
            .next()
            .and_then(|f| f.parse::<f64>().ok())
            .ok_or_else(|| {
                VelprofError::Coefficients(format!("line {}: header has no epoch", line_no))
            })?;
        let name = fields.next().unwrap_or("unnamed").to_string();
        Ok((epoch, name))
    }

    fn parse_row(line_no: usize, line: &str) -> VelprofResult<GaussCoefficient> {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 6 {
            return Err(VelprofError::Coefficients(format!(
                "line {}: expected 6 fields, found {}",
                line_no,
                fields.len()
            )));
        }

        let degree = |i: usize| {
            fields[i].parse::<usize>().map_err(|_| {
                VelprofError::Coefficients(format!(
                    "line {}: invalid degree/order {:?}",
                    line_no, fields[i]
                ))
            })
        };
        let value = |i: usize| {
            fields[i].parse::<f64>().map_err(|_| {
                VelprofError::Coefficients(format!("line {}: invalid value {:?}", line_no, fields[i]))
            })
        };

        Ok(GaussCoefficient {
            n: degree(0)?,
            m: degree(1)?,
            g: value(2)?,
            h: value(3)?,
            dg: value(4)?,
            dh: value(5)?,
        })
    }
}
