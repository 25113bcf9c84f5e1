pub mod queries;

use std::collections::HashSet;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use once_cell::sync::OnceCell;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DataError {
    #[error("failed to read dataset {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("invalid record {record} in dataset {}: {reason}", path.display())]
    InvalidRecord {
        path: PathBuf,
        record: usize,
        reason: String,
    },
    #[error("dataset {} contains no passenger records", path.display())]
    Empty { path: PathBuf },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sex {
    Male,
    Female,
}

impl Sex {
    pub const ALL: [Sex; 2] = [Sex::Male, Sex::Female];

    pub fn label(self) -> &'static str {
        match self {
            Self::Male => "Male",
            Self::Female => "Female",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "male" => Some(Self::Male),
            "female" => Some(Self::Female),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Port {
    Southampton,
    Cherbourg,
    Queenstown,
}

impl Port {
    pub const ALL: [Port; 3] = [Port::Southampton, Port::Cherbourg, Port::Queenstown];

    pub fn name(self) -> &'static str {
        match self {
            Self::Southampton => "Southampton",
            Self::Cherbourg => "Cherbourg",
            Self::Queenstown => "Queenstown",
        }
    }

    fn parse(code: &str) -> Option<Self> {
        match code {
            "S" => Some(Self::Southampton),
            "C" => Some(Self::Cherbourg),
            "Q" => Some(Self::Queenstown),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PassengerClass {
    First,
    Second,
    Third,
}

impl PassengerClass {
    pub const ALL: [PassengerClass; 3] = [
        PassengerClass::First,
        PassengerClass::Second,
        PassengerClass::Third,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::First => "First Class",
            Self::Second => "Second Class",
            Self::Third => "Third Class",
        }
    }

    pub fn short_label(self) -> &'static str {
        match self {
            Self::First => "1st Class",
            Self::Second => "2nd Class",
            Self::Third => "3rd Class",
        }
    }

    fn from_number(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::First),
            2 => Some(Self::Second),
            3 => Some(Self::Third),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Passenger {
    pub survived: bool,
    pub class: PassengerClass,
    pub name: String,
    pub sex: Sex,
    pub age: Option<f64>,
    pub fare: Option<f64>,
    pub embarked: Option<Port>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawPassenger {
    survived: u8,
    pclass: u8,
    name: String,
    sex: String,
    age: Option<f64>,
    fare: Option<f64>,
    embarked: Option<String>,
}

impl RawPassenger {
    fn into_passenger(self) -> Result<Passenger, String> {
        let survived = match self.survived {
            0 => false,
            1 => true,
            other => return Err(format!("Survived must be 0 or 1, got {other}")),
        };
        let class = PassengerClass::from_number(self.pclass)
            .ok_or_else(|| format!("unknown Pclass {}", self.pclass))?;
        let sex = Sex::parse(&self.sex).ok_or_else(|| format!("unknown Sex '{}'", self.sex))?;
        let embarked = match self.embarked.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(code) => {
                Some(Port::parse(code).ok_or_else(|| format!("unknown Embarked '{code}'"))?)
            }
        };

        Ok(Passenger {
            survived,
            class,
            name: self.name,
            sex,
            age: self.age.filter(|age| age.is_finite()),
            fare: self.fare.filter(|fare| fare.is_finite()),
            embarked,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AgeStats {
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    pub count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SexCounts {
    pub male: usize,
    pub female: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupSurvival<G> {
    pub group: G,
    pub survived: usize,
    pub total: usize,
}

impl<G> GroupSurvival<G> {
    pub fn not_survived(&self) -> usize {
        self.total - self.survived
    }

    pub fn rate(&self) -> f64 {
        percentage(self.survived, self.total)
    }
}

/// Headline figures quoted in the agent's system instruction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DatasetFacts {
    pub total: usize,
    pub survived: usize,
    pub not_survived: usize,
    pub survival_rate: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    passengers: Vec<Passenger>,
}

impl Dataset {
    pub fn from_passengers(passengers: Vec<Passenger>) -> Self {
        Self { passengers }
    }

    pub fn from_csv_path(path: &Path) -> Result<Self, DataError> {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(path)
            .map_err(|source| DataError::Read {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_csv_reader(reader, path)
    }

    pub fn from_reader<R: Read>(reader: R, origin: &Path) -> Result<Self, DataError> {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        Self::from_csv_reader(reader, origin)
    }

    fn from_csv_reader<R: Read>(
        mut reader: csv::Reader<R>,
        origin: &Path,
    ) -> Result<Self, DataError> {
        let mut passengers = Vec::new();
        for (index, record) in reader.deserialize::<RawPassenger>().enumerate() {
            let raw = record.map_err(|source| DataError::Read {
                path: origin.to_path_buf(),
                source,
            })?;
            let passenger = raw
                .into_passenger()
                .map_err(|reason| DataError::InvalidRecord {
                    path: origin.to_path_buf(),
                    record: index + 1,
                    reason,
                })?;
            passengers.push(passenger);
        }

        if passengers.is_empty() {
            return Err(DataError::Empty {
                path: origin.to_path_buf(),
            });
        }

        Ok(Self { passengers })
    }

    pub fn passengers(&self) -> &[Passenger] {
        &self.passengers
    }

    pub fn len(&self) -> usize {
        self.passengers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passengers.is_empty()
    }

    pub fn survived_count(&self) -> usize {
        self.passengers.iter().filter(|p| p.survived).count()
    }

    pub fn survival_rate(&self) -> f64 {
        percentage(self.survived_count(), self.len())
    }

    pub fn sex_counts(&self) -> SexCounts {
        let male = self
            .passengers
            .iter()
            .filter(|p| p.sex == Sex::Male)
            .count();
        SexCounts {
            male,
            female: self.len() - male,
        }
    }

    pub fn average_fare(&self) -> Option<f64> {
        mean(self.passengers.iter().filter_map(|p| p.fare))
    }

    /// Passenger counts per port, largest first. Unknown ports are skipped.
    pub fn embarkation_counts(&self) -> Vec<(Port, usize)> {
        let mut counts: Vec<(Port, usize)> = Port::ALL
            .iter()
            .map(|port| {
                let count = self
                    .passengers
                    .iter()
                    .filter(|p| p.embarked == Some(*port))
                    .count();
                (*port, count)
            })
            .filter(|(_, count)| *count > 0)
            .collect();
        counts.sort_by(|a, b| b.1.cmp(&a.1));
        counts
    }

    pub fn ages(&self) -> Vec<f64> {
        self.passengers.iter().filter_map(|p| p.age).collect()
    }

    pub fn age_stats(&self) -> Option<AgeStats> {
        let ages = self.ages();
        let mean = mean(ages.iter().copied())?;
        let min = ages.iter().copied().fold(f64::INFINITY, f64::min);
        let max = ages.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        Some(AgeStats {
            mean,
            min,
            max,
            count: ages.len(),
        })
    }

    pub fn class_counts(&self) -> Vec<(PassengerClass, usize)> {
        self.survival_by_class()
            .into_iter()
            .map(|group| (group.group, group.total))
            .collect()
    }

    pub fn survival_by_sex(&self) -> Vec<GroupSurvival<Sex>> {
        Sex::ALL
            .iter()
            .map(|sex| self.group_survival(*sex, |p| p.sex == *sex))
            .filter(|group| group.total > 0)
            .collect()
    }

    pub fn survival_by_class(&self) -> Vec<GroupSurvival<PassengerClass>> {
        PassengerClass::ALL
            .iter()
            .map(|class| self.group_survival(*class, |p| p.class == *class))
            .filter(|group| group.total > 0)
            .collect()
    }

    /// Highest fares first, one entry per distinct name, passengers without
    /// a recorded fare left out.
    pub fn top_wealthiest(&self, limit: usize) -> Vec<&Passenger> {
        let mut ranked: Vec<&Passenger> =
            self.passengers.iter().filter(|p| p.fare.is_some()).collect();
        ranked.sort_by(|a, b| fare_of(b).total_cmp(&fare_of(a)));

        let mut seen = HashSet::new();
        ranked
            .into_iter()
            .filter(|p| seen.insert(p.name.as_str()))
            .take(limit)
            .collect()
    }

    pub fn facts(&self) -> DatasetFacts {
        let survived = self.survived_count();
        DatasetFacts {
            total: self.len(),
            survived,
            not_survived: self.len() - survived,
            survival_rate: round_to(self.survival_rate(), 2),
        }
    }

    fn group_survival<G>(&self, group: G, pred: impl Fn(&Passenger) -> bool) -> GroupSurvival<G> {
        let members = self.passengers.iter().filter(|p| pred(*p));
        let (total, survived) = members.fold((0, 0), |(total, survived), p| {
            (total + 1, survived + usize::from(p.survived))
        });
        GroupSurvival {
            group,
            survived,
            total,
        }
    }
}

fn fare_of(passenger: &Passenger) -> f64 {
    passenger.fare.unwrap_or(0.0)
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 {
        None
    } else {
        Some(sum / count as f64)
    }
}

/// Share of `part` in `whole` as a percentage; zero when `whole` is zero.
pub fn percentage(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Lazily loaded, process-lifetime dataset handle.
///
/// The first successful load is cached and shared; a failed load is reported
/// to the caller and attempted again on the next access.
#[derive(Debug)]
pub struct DatasetSource {
    path: PathBuf,
    cell: OnceCell<Arc<Dataset>>,
}

impl DatasetSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cell: OnceCell::new(),
        }
    }

    pub fn preloaded(dataset: Dataset) -> Self {
        Self {
            path: PathBuf::from("<memory>"),
            cell: OnceCell::with_value(Arc::new(dataset)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_loaded(&self) -> bool {
        self.cell.get().is_some()
    }

    pub fn get(&self) -> Result<Arc<Dataset>, DataError> {
        self.cell
            .get_or_try_init(|| {
                tracing::info!(path = %self.path.display(), "loading passenger dataset");
                let dataset = Dataset::from_csv_path(&self.path)?;
                tracing::info!(records = dataset.len(), "passenger dataset loaded");
                Ok(Arc::new(dataset))
            })
            .cloned()
    }
}
