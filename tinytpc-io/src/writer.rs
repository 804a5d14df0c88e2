//! CSV writers for reconstruction results.

use crate::Result;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tinytpc_algorithms::RunReconstruction;
use tinytpc_anode::{AddressMapper, ChargeCalibration, PedestalMap};
use tinytpc_core::PixelCoord;

/// Column header of the candidate summary.
pub const CANDIDATE_HEADER: &str = "window,start_tick,end_tick,hits,occupied_pixels,lines,class,accuracy,angle,status,px,py,pz,dx,dy,dz,samples,mean_dadc_dx";

/// Column header of the dE/dx samples, without the charge column.
pub const DEDX_HEADER: &str = "window,grid_x,grid_y,amplitude,path_length,dadc_dx";

/// Writes one run's results as CSV.
pub struct ResultWriter<W: Write> {
    writer: W,
}

impl ResultWriter<BufWriter<File>> {
    /// Creates a writer for a new file.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::new(BufWriter::new(File::create(path)?)))
    }
}

impl<W: Write> ResultWriter<W> {
    /// Wraps an existing writer.
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// One row per candidate. Undefined values are left empty.
    pub fn write_candidates_csv(&mut self, run: &RunReconstruction) -> Result<()> {
        writeln!(self.writer, "{CANDIDATE_HEADER}")?;
        for c in &run.candidates {
            let (point, direction) = match &c.line3d {
                Some(line) => (
                    format!("{},{},{}", line.point.x, line.point.y, line.point.z),
                    format!("{},{},{}", line.direction.x, line.direction.y, line.direction.z),
                ),
                None => (",,".to_string(), ",,".to_string()),
            };
            writeln!(
                self.writer,
                "{},{},{},{},{},{},{},{},{},{},{},{},{},{}",
                c.window.index,
                c.window.start_tick,
                c.window.end_tick,
                c.hit_count,
                c.occupied_pixels,
                c.line2d.lines_detected,
                c.line2d.class,
                optional(c.line2d.accuracy),
                optional(c.line2d.angle),
                c.status.as_str(),
                point,
                direction,
                c.dedx.samples.len(),
                optional(c.dedx.mean_dadc_dx()),
            )?;
        }
        self.writer.flush()?;
        Ok(())
    }

    /// One row per dE/dx sample of every fitted candidate.
    ///
    /// With a calibration a `dq_dx_ke` column (thousand electrons per mm) is added.
    pub fn write_dedx_csv(
        &mut self,
        run: &RunReconstruction,
        calibration: Option<&ChargeCalibration>,
    ) -> Result<()> {
        if calibration.is_some() {
            writeln!(self.writer, "{DEDX_HEADER},dq_dx_ke")?;
        } else {
            writeln!(self.writer, "{DEDX_HEADER}")?;
        }
        for c in run.fitted() {
            for s in &c.dedx.samples {
                write!(
                    self.writer,
                    "{},{},{},{},{},{}",
                    c.window.index, s.grid_x, s.grid_y, s.amplitude, s.path_length, s.dadc_dx
                )?;
                if let Some(cal) = calibration {
                    write!(self.writer, ",{}", cal.dq_dx(s))?;
                }
                writeln!(self.writer)?;
            }
        }
        self.writer.flush()?;
        Ok(())
    }

    /// One row per pixel with its pedestal-run statistics.
    ///
    /// `tick_us` converts the live time to seconds for the rate column.
    pub fn write_pedestal_stats_csv(
        &mut self,
        pedestal: &PedestalMap,
        mapper: &AddressMapper,
        tick_us: f64,
    ) -> Result<()> {
        writeln!(
            self.writer,
            "x,y,chip_id,channel_id,calibrated,count,baseline,std,rate_hz"
        )?;
        for coord in PixelCoord::all() {
            let (chip, channel) = mapper.address_of(coord)?;
            let stats = pedestal.stats(coord).unwrap_or_default();
            writeln!(
                self.writer,
                "{},{},{},{},{},{},{},{},{}",
                coord.x,
                coord.y,
                chip,
                channel,
                u8::from(pedestal.is_calibrated(coord)),
                stats.count,
                pedestal.baseline(coord),
                stats.std,
                optional(pedestal.rate_hz(coord, tick_us)),
            )?;
        }
        self.writer.flush()?;
        Ok(())
    }

    /// Consumes the writer, returning the inner sink.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

fn optional(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Vector3;
    use tempfile::NamedTempFile;
    use tinytpc_algorithms::{CandidateResult, CandidateStatus, DedxEstimate};
    use tinytpc_anode::HitTableStats;
    use tinytpc_core::{DxDSample, FittedLine2D, FittedLine3D, WindowId};

    fn sample_run() -> RunReconstruction {
        let fitted = CandidateResult {
            window: WindowId {
                index: 3,
                start_tick: 30,
                end_tick: 40,
            },
            hit_count: 6,
            occupied_pixels: 6,
            line2d: FittedLine2D::degenerate(0.0),
            line3d: Some(FittedLine3D {
                point: Vector3::new(1.0, 2.0, 0.0),
                direction: Vector3::new(0.0, 1.0, 0.0),
            }),
            dedx: DedxEstimate {
                samples: vec![DxDSample {
                    grid_x: 10,
                    grid_y: 0,
                    amplitude: 50.0,
                    path_length: 2.0,
                    dadc_dx: 25.0,
                }],
                ..DedxEstimate::default()
            },
            status: CandidateStatus::Fitted,
        };
        let ambiguous = CandidateResult {
            window: WindowId {
                index: 5,
                start_tick: 50,
                end_tick: 60,
            },
            hit_count: 40,
            occupied_pixels: 30,
            line2d: FittedLine2D::ambiguous(3),
            line3d: None,
            dedx: DedxEstimate::default(),
            status: CandidateStatus::Ambiguous,
        };
        RunReconstruction {
            hit_stats: HitTableStats::default(),
            origin_tick: 0,
            candidates_found: 2,
            candidates_dropped: 0,
            candidates: vec![fitted, ambiguous],
        }
    }

    #[test]
    fn test_candidate_rows() {
        let mut writer = ResultWriter::new(Vec::new());
        writer.write_candidates_csv(&sample_run()).unwrap();
        let text = String::from_utf8(writer.into_inner()).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], CANDIDATE_HEADER);
        assert_eq!(lines[1], "3,30,40,6,6,0,degenerate,1,0,fitted,1,2,0,0,1,0,1,25");
        assert_eq!(lines[2], "5,50,60,40,30,3,ambiguous,,,ambiguous,,,,,,,0,");

        let columns = CANDIDATE_HEADER.split(',').count();
        for line in &lines {
            assert_eq!(line.split(',').count(), columns);
        }
    }

    #[test]
    fn test_dedx_rows_with_charge() {
        let file = NamedTempFile::new().unwrap();
        let calibration = ChargeCalibration::default();
        ResultWriter::create(file.path())
            .unwrap()
            .write_dedx_csv(&sample_run(), Some(&calibration))
            .unwrap();
        let text = std::fs::read_to_string(file.path()).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with(",dq_dx_ke"));
        let charge: f64 = lines[1].rsplit(',').next().unwrap().parse().unwrap();
        approx::assert_relative_eq!(charge, 25.0 * calibration.ke_per_adc(), epsilon = 1e-12);
    }

    #[test]
    fn test_dedx_rows_without_charge() {
        let mut writer = ResultWriter::new(Vec::new());
        writer.write_dedx_csv(&sample_run(), None).unwrap();
        let text = String::from_utf8(writer.into_inner()).unwrap();
        assert_eq!(text, format!("{DEDX_HEADER}\n3,10,0,50,2,25\n"));
    }
}
