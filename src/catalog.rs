use std::collections::HashMap;

use crate::model::{FloorId, LotId, SlotId, VehicleClass};

/// Problems in lot/floor configuration. These are terminal for the affected
/// view: there is nothing a user can do about a malformed layout.
#[derive(Debug, PartialEq, Eq)]
pub enum CatalogError {
    BadSlotCode(String),
    DuplicateSlot(String),
    AvailableExceedsTotal { lot: LotId },
    DuplicateLot(LotId),
}

impl std::fmt::Display for CatalogError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CatalogError::BadSlotCode(code) => write!(f, "bad slot code: {code}"),
            CatalogError::DuplicateSlot(code) => write!(f, "duplicate slot code: {code}"),
            CatalogError::AvailableExceedsTotal { lot } => {
                write!(f, "lot {lot}: available exceeds total capacity")
            }
            CatalogError::DuplicateLot(id) => write!(f, "duplicate lot id: {id}"),
        }
    }
}

impl std::error::Error for CatalogError {}

/// A floor: display name plus a fixed 2-D grid of cells. A cell is either
/// empty (a driving lane) or a slot code, and every slot code maps to
/// exactly one vehicle class.
#[derive(Debug, Clone)]
pub struct Floor {
    pub id: FloorId,
    pub name: String,
    pub grid: Vec<Vec<Option<SlotId>>>,
    pub slot_classes: HashMap<SlotId, VehicleClass>,
}

impl Floor {
    /// Build a floor from rows of slot codes; `""` marks an empty cell.
    /// The trailing letter of a code names its class: C(ar), B(ike),
    /// S(UV), E(V). Duplicate or unclassifiable codes are rejected.
    pub fn from_rows(
        id: impl Into<FloorId>,
        name: impl Into<String>,
        rows: &[&[&str]],
    ) -> Result<Self, CatalogError> {
        let mut grid = Vec::with_capacity(rows.len());
        let mut slot_classes = HashMap::new();

        for row in rows {
            let mut cells = Vec::with_capacity(row.len());
            for &code in *row {
                if code.is_empty() {
                    cells.push(None);
                    continue;
                }
                let class = match code.chars().last() {
                    Some('C') => VehicleClass::Car,
                    Some('B') => VehicleClass::Bike,
                    Some('S') => VehicleClass::Suv,
                    Some('E') => VehicleClass::Ev,
                    _ => return Err(CatalogError::BadSlotCode(code.to_string())),
                };
                let slot = SlotId::from(code);
                if slot_classes.insert(slot.clone(), class).is_some() {
                    return Err(CatalogError::DuplicateSlot(code.to_string()));
                }
                cells.push(Some(slot));
            }
            grid.push(cells);
        }

        Ok(Self {
            id: id.into(),
            name: name.into(),
            grid,
            slot_classes,
        })
    }

    pub fn slot_count(&self) -> usize {
        self.slot_classes.len()
    }

    pub fn class_of(&self, slot: &SlotId) -> Option<VehicleClass> {
        self.slot_classes.get(slot).copied()
    }
}

/// Static description of one parking facility.
#[derive(Debug, Clone)]
pub struct LotConfig {
    pub id: LotId,
    pub name: String,
    /// Total capacity across all floors.
    pub total: u32,
    /// Available count at first startup; replay subtracts occupancy events.
    pub seed_available: u32,
    pub supported: Vec<VehicleClass>,
    pub floors: Vec<Floor>,
}

/// Read-mostly configuration: the full set of lots and their layouts.
/// Lot order is meaningful (it is the display order).
#[derive(Debug, Clone)]
pub struct Catalog {
    lots: Vec<LotConfig>,
}

impl Catalog {
    pub fn new(lots: Vec<LotConfig>) -> Result<Self, CatalogError> {
        let mut seen = std::collections::HashSet::new();
        for lot in &lots {
            if !seen.insert(lot.id) {
                return Err(CatalogError::DuplicateLot(lot.id));
            }
            if lot.seed_available > lot.total {
                return Err(CatalogError::AvailableExceedsTotal { lot: lot.id });
            }
        }
        Ok(Self { lots })
    }

    pub fn lots(&self) -> &[LotConfig] {
        &self.lots
    }

    pub fn lot(&self, id: LotId) -> Option<&LotConfig> {
        self.lots.iter().find(|l| l.id == id)
    }

    pub fn floor(&self, lot: LotId, floor: &str) -> Option<&Floor> {
        self.lot(lot)?.floors.iter().find(|f| f.id == floor)
    }

    pub fn total_capacity(&self) -> u32 {
        self.lots.iter().map(|l| l.total).sum()
    }

    /// The built-in demo catalog: three lots with fixed layouts.
    pub fn seed() -> Self {
        use VehicleClass::*;

        let main_mall = LotConfig {
            id: 1,
            name: "Main Mall Lot".into(),
            total: 150,
            seed_available: 45,
            supported: vec![Car, Suv, Ev],
            floors: vec![
                must_floor("G", "Ground Floor", &[
                    &["G1-C", "G2-C", "", "G3-E", "G4-S", "G5-C", "G6-C"],
                    &["G7-C", "G8-C", "", "G9-E", "G10-S", "G11-C", "G12-C"],
                    &["", "", "G13-C", "G14-C", "G15-S", "", ""],
                ]),
                must_floor("1", "First Floor", &[
                    &["1A-C", "1B-C", "1C-C", "", "1D-S", "1E-C", "1F-C"],
                    &["1G-C", "1H-C", "", "1I-S", "1J-C", "1K-C", "1L-C"],
                    &["1M-C", "1N-C", "1O-C", "1P-S", "1Q-C", "1R-C", "1S-C"],
                ]),
                must_floor("2", "Second Floor", &[
                    &["2A-C", "2B-C", "2C-S", "2D-C", "2E-C"],
                    &["2F-C", "2G-S", "2H-C", "2I-C", "2J-C"],
                    &["2K-C", "2L-C", "2M-S", "2N-C", "2O-C"],
                    &["2P-C", "2Q-C", "2R-S", "2S-C", "2T-C"],
                ]),
            ],
        };

        let airport = LotConfig {
            id: 2,
            name: "Airport Lot A".into(),
            total: 200,
            seed_available: 0,
            supported: vec![Car, Bike, Suv],
            floors: vec![
                must_floor("P1", "Parking Level 1", &[
                    &["P1-1C", "P1-2C", "P1-3B", "", "P1-4S"],
                    &["P1-5C", "P1-6B", "", "P1-7S", "P1-8C"],
                ]),
                must_floor("P2", "Parking Level 2", &[
                    &["P2-1C", "P2-2C", "P2-3B", "P2-4C"],
                    &["P2-5C", "P2-6B", "P2-7C", "P2-8C"],
                    &["P2-9C", "P2-10B", "P2-11C", "P2-12C"],
                ]),
            ],
        };

        let stadium = LotConfig {
            id: 3,
            name: "Stadium Parking".into(),
            total: 120,
            seed_available: 30,
            supported: vec![Car, Bike, Suv, Ev],
            floors: vec![
                must_floor("B1", "Basement 1", &[
                    &["B1-1C", "B1-2B", "B1-3C", "B1-4B"],
                    &["B1-5C", "", "B1-6B", "B1-7C"],
                ]),
                must_floor("B2", "Basement 2", &[
                    &["B2-1C", "B2-2S", "B2-3C"],
                    &["B2-4S", "B2-5C", "B2-6S"],
                    &["B2-7C", "B2-8S", "B2-9C"],
                ]),
                must_floor("B3", "Basement 3", &[
                    &["B3-1E", "B3-2E", "B3-3E", "B3-4E", "B3-5E"],
                    &["", "B3-6C", "B3-7C", "B3-8C", ""],
                ]),
                must_floor("B4", "Basement 4", &[
                    &["B4-1C", "B4-2B"],
                    &["B4-3C", "B4-4B"],
                    &["B4-5S", "B4-6B"],
                    &["B4-7S", "B4-8B"],
                ]),
            ],
        };

        Catalog::new(vec![main_mall, airport, stadium])
            .expect("seed catalog is well-formed")
    }
}

fn must_floor(id: &str, name: &str, rows: &[&[&str]]) -> Floor {
    Floor::from_rows(id, name, rows).expect("seed floor is well-formed")
}
