//! Small transport-model store used by the `symql demo` command, benches and tests.

use super::special::{SV_EPS, SV_NA};
use super::symbol::SymbolKind;
use super::writer::{StoreWriter, DEFAULT_VARIABLE_VALUES};
use crate::error::ConnectorResult;

pub const PLANTS: [&str; 2] = ["seattle", "san-diego"];
pub const MARKETS: [&str; 3] = ["new-york", "chicago", "topeka"];

/// Build the transport model store
pub fn transport_store() -> ConnectorResult<StoreWriter> {
    let mut w = StoreWriter::new();
    let open = w.add_acronym("open");

    let i = w.add_symbol("i", SymbolKind::Set, &["*"], "canning plants")?;
    w.add_set_element(i, &["seattle"], Some("west coast"))?;
    w.add_set_element(i, &["san-diego"], None)?;

    let j = w.add_symbol("j", SymbolKind::Set, &["*"], "markets")?;
    for market in MARKETS {
        w.add_set_element(j, &[market], None)?;
    }

    let a = w.add_symbol("a", SymbolKind::Parameter, &["i"], "capacity of plant i in cases")?;
    w.add_value(a, &["seattle"], 350.0)?;
    w.add_value(a, &["san-diego"], 600.0)?;

    let b = w.add_symbol("b", SymbolKind::Parameter, &["j"], "demand at market j in cases")?;
    for (market, demand) in MARKETS.into_iter().zip([325.0, 300.0, 275.0]) {
        w.add_value(b, &[market], demand)?;
    }

    let d = w.add_symbol("d", SymbolKind::Parameter, &["i", "j"], "distance in thousands of miles")?;
    let distances = [[2.5, 1.7, 1.8], [2.5, 1.8, 1.4]];
    for (plant, row) in PLANTS.into_iter().zip(distances) {
        for (market, distance) in MARKETS.into_iter().zip(row) {
            w.add_value(d, &[plant, market], distance)?;
        }
    }

    let f = w.add_symbol("f", SymbolKind::Parameter, &[], "freight in dollars per case per thousand miles")?;
    w.add_value(f, &[], 90.0)?;

    let status = w.add_symbol("status", SymbolKind::Parameter, &["i"], "plant status")?;
    w.add_value(status, &["seattle"], open)?;
    w.add_value(status, &["san-diego"], SV_NA)?;

    let x = w.add_symbol("x", SymbolKind::Variable, &["i", "j"], "shipment quantities in cases")?;
    let shipments = [[(50.0, 0.0), (300.0, 0.0), (0.0, 0.036)], [(275.0, 0.0), (0.0, 0.009), (275.0, SV_EPS)]];
    for (plant, row) in PLANTS.into_iter().zip(shipments) {
        for (market, (level, marginal)) in MARKETS.into_iter().zip(row) {
            let mut values = DEFAULT_VARIABLE_VALUES;
            values[0] = level;
            values[1] = marginal;
            values[2] = 0.0;
            w.add_values(x, &[plant, market], values)?;
        }
    }

    let z = w.add_symbol("z", SymbolKind::Variable, &[], "total transportation costs in thousands of dollars")?;
    let mut values = DEFAULT_VARIABLE_VALUES;
    values[0] = 153.675;
    w.add_values(z, &[], values)?;

    let supply = w.add_symbol("supply", SymbolKind::Equation, &["i"], "observe supply limit at plant i")?;
    for (plant, (level, marginal, upper)) in PLANTS.into_iter().zip([(350.0, SV_EPS, 350.0), (550.0, 0.0, 600.0)]) {
        w.add_values(supply, &[plant], [level, marginal, f64::NEG_INFINITY, upper, 1.0])?;
    }

    Ok(w)
}
