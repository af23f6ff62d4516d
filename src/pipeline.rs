//! Pipeline orchestration
//!
//! This module provides the public API for chair-flux. It wires one store and
//! one classifier into the live path (throttled current reading, spatial
//! grids) and the batch path (day tables, outlier filtering, last active day
//! with its summary, CSV export).

use chrono::NaiveDate;
use serde::Serialize;
use std::io::Write;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::classifier::PostureClassifier;
use crate::config::PipelineConfig;
use crate::error::ChairError;
use crate::export::write_csv;
use crate::history::{ActiveDay, HistoryReader};
use crate::outlier::{FilterOutcome, OutlierFilter};
use crate::poller::{Clock, CurrentReading, CurrentReadingPoller, SystemClock};
use crate::spatial::{pressure_asymmetry, AsymmetryBand, SpatialGrid, SpatialMapper};
use crate::store::RemoteStore;
use crate::summary::DaySummary;
use crate::types::{ReadingTable, CHANNEL_COUNT};

/// Last active day together with its posture summary
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActiveDayReport {
    pub instance_id: Uuid,
    #[serde(flatten)]
    pub active: ActiveDay,
    pub summary: Option<DaySummary>,
}

/// Current reading rendered for display
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CurrentView {
    #[serde(flatten)]
    pub current: CurrentReading,
    pub grid: Option<SpatialGrid>,
    pub asymmetry: Vec<AsymmetryBand>,
}

/// Stateful processor shared by the dashboard and batch jobs.
///
/// Holds the poll cache, so keep one instance per chair and share it via `Arc`.
pub struct ChairPipeline {
    instance_id: Uuid,
    config: PipelineConfig,
    clock: Arc<dyn Clock>,
    poller: CurrentReadingPoller,
    history: HistoryReader,
    filter: OutlierFilter,
    mapper: SpatialMapper,
}

impl ChairPipeline {
    /// Create a pipeline reading wall-clock time
    pub fn new(
        store: Arc<dyn RemoteStore>,
        classifier: Arc<dyn PostureClassifier>,
        config: PipelineConfig,
    ) -> Result<Self, ChairError> {
        Self::with_clock(store, classifier, Arc::new(SystemClock), config)
    }

    pub fn with_clock(
        store: Arc<dyn RemoteStore>,
        classifier: Arc<dyn PostureClassifier>,
        clock: Arc<dyn Clock>,
        config: PipelineConfig,
    ) -> Result<Self, ChairError> {
        config.validate()?;

        let poller = CurrentReadingPoller::new(
            Arc::clone(&store),
            Arc::clone(&classifier),
            Arc::clone(&clock),
            &config,
        )?;
        let history = HistoryReader::new(
            store,
            classifier,
            config.layout,
            config.day_scan,
            config.max_lookback_days,
        );
        let filter = OutlierFilter::new(config.outlier_window, config.outlier_threshold);
        let mapper = SpatialMapper::new(config.grid_scale_y);
        let instance_id = Uuid::new_v4();

        info!(%instance_id, layout = config.layout.as_str(), "pipeline ready");

        Ok(Self {
            instance_id,
            config,
            clock,
            poller,
            history,
            filter,
            mapper,
        })
    }

    pub fn instance_id(&self) -> Uuid {
        self.instance_id
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn poller(&self) -> &CurrentReadingPoller {
        &self.poller
    }

    pub fn mapper(&self) -> &SpatialMapper {
        &self.mapper
    }

    /// Today's date in the chair's local offset
    pub fn today(&self) -> Result<NaiveDate, ChairError> {
        let offset = self.config.utc_offset()?;
        Ok(self.clock.now().with_timezone(&offset).date_naive())
    }

    /// Current label and reading, throttled by the polling interval
    pub fn current_reading(&self) -> Result<CurrentReading, ChairError> {
        self.poller.current_reading()
    }

    /// Current reading with its grids and band asymmetry.
    ///
    /// Grids are only rendered while the chair is occupied; a fresh row
    /// classified as empty keeps its reading but gets no heat map.
    pub fn current_view(&self) -> Result<CurrentView, ChairError> {
        let current = self.poller.current_reading()?;
        let (grid, asymmetry) = match &current.reading {
            Some(reading) if current.label.is_occupied() => (
                Some(self.mapper.generate_grid(reading)),
                pressure_asymmetry(reading),
            ),
            _ => (None, Vec::new()),
        };
        Ok(CurrentView {
            current,
            grid,
            asymmetry,
        })
    }

    /// Grids for an arbitrary channel vector
    pub fn grid_for(&self, values: &[f64; CHANNEL_COUNT]) -> SpatialGrid {
        self.mapper.generate_grid_from_values(values)
    }

    /// All valid rows of a day, unfiltered
    pub fn day_table(&self, day: NaiveDate) -> Result<ReadingTable, ChairError> {
        self.history.day_table(day)
    }

    /// Rows of a day with glitch rows removed
    pub fn filtered_day(&self, day: NaiveDate) -> Result<FilterOutcome, ChairError> {
        let table = self.history.day_table(day)?;
        Ok(self.filter.filter(table))
    }

    /// Most recent day with readings, relative to today
    pub fn last_active_day(&self) -> Result<Option<ActiveDayReport>, ChairError> {
        let today = self.today()?;
        Ok(self.history.last_active_day(today)?.map(|active| {
            let summary = DaySummary::from_labels(active.day, &active.labels);
            ActiveDayReport {
                instance_id: self.instance_id,
                active,
                summary,
            }
        }))
    }

    /// Write a day as CSV; returns the number of data rows
    pub fn export_day_csv<W: Write>(
        &self,
        day: NaiveDate,
        filtered: bool,
        writer: W,
    ) -> Result<usize, ChairError> {
        let table = if filtered {
            self.filtered_day(day)?.table
        } else {
            self.day_table(day)?
        };
        write_csv(&table, writer)?;
        Ok(table.len())
    }
}
