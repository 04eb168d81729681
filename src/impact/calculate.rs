use serde::{Deserialize, Serialize};

use super::sources::{ClimateData, EnergyData, LocationData};
use super::DataCenterSpec;

const HOURS_PER_YEAR: f64 = 24.0 * 365.0;
/// US grid average, pounds of CO2 per kWh
const LBS_CO2_PER_KWH: f64 = 0.92;
const PEOPLE_PER_HOUSEHOLD: f64 = 2.5;
const HOUSEHOLD_KWH_PER_YEAR: f64 = 10_000.0;
const GALLONS_PER_CAPITA_PER_DAY: f64 = 82.0;
const CAR_TONS_CO2_PER_YEAR: f64 = 4.6;
const OLYMPIC_POOL_GALLONS: f64 = 660_000.0;
const CONSTRUCTION_COST_PER_SQFT: f64 = 1_000.0;
/// Energy is roughly two thirds of operating cost
const OPERATING_COST_MULTIPLIER: f64 = 1.5;
/// Cooling baseline, degrees Fahrenheit
pub(crate) const COOLING_BASELINE_F: f64 = 70.0;

/// Energy consumption and cost
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnergyImpact {
    pub annual_mwh: f64,
    pub annual_kwh: f64,
    pub annual_cost: f64,
    pub percent_increase: f64,
    pub cost_per_household_annually: f64,
    pub cooling_factor: f64,
    pub adjusted_annual_kwh: f64,
}

/// Carbon emissions and equivalents
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CarbonImpact {
    pub annual_tons_co2: f64,
    pub equivalent_cars: f64,
    pub equivalent_homes: f64,
}

/// Water draw relative to the region
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaterImpact {
    pub daily_gallons: u64,
    pub annual_gallons: f64,
    pub percent_increase: f64,
    pub olympic_pools_per_year: f64,
}

/// Jobs and spend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EconomicImpact {
    pub jobs_created: u32,
    pub estimated_construction_cost: f64,
    pub annual_operating_cost: f64,
}

/// All computed impact figures
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpactReport {
    pub energy: EnergyImpact,
    pub carbon: CarbonImpact,
    pub water: WaterImpact,
    pub economic: EconomicImpact,
}

/// Tons of CO2 a facility of the given draw emits over a year
pub fn annual_carbon_tons(power_mw: f64) -> f64 {
    power_mw * 1_000.0 * HOURS_PER_YEAR * LBS_CO2_PER_KWH / 2_000.0
}

fn ratio_percent(part: f64, whole: f64) -> f64 {
    if whole > 0.0 {
        part / whole * 100.0
    } else {
        0.0
    }
}

/// Compute energy, carbon, water, and economic figures for a facility
pub fn calculate_impact(
    spec: &DataCenterSpec,
    location: &LocationData,
    energy: &EnergyData,
    climate: &ClimateData,
) -> ImpactReport {
    let annual_kwh = spec.power_mw * 1_000.0 * HOURS_PER_YEAR;
    let annual_cost = annual_kwh * energy.price_per_kwh;
    let annual_tons_co2 = annual_carbon_tons(spec.power_mw);

    let population = location.population as f64;
    let households = population / PEOPLE_PER_HOUSEHOLD;
    let regional_kwh = households * HOUSEHOLD_KWH_PER_YEAR;
    let regional_water = population * GALLONS_PER_CAPITA_PER_DAY;

    let cost_per_household = if households > 0.0 {
        annual_cost / households
    } else {
        0.0
    };

    // 1% more cooling load per degree above the baseline
    let cooling_factor = 1.0 + (climate.temperature_f - COOLING_BASELINE_F) / 100.0;

    let daily_gallons = spec.water_gallons_per_day;
    let annual_gallons = daily_gallons as f64 * 365.0;

    ImpactReport {
        energy: EnergyImpact {
            annual_mwh: spec.power_mw * HOURS_PER_YEAR,
            annual_kwh,
            annual_cost,
            percent_increase: ratio_percent(annual_kwh, regional_kwh),
            cost_per_household_annually: cost_per_household,
            cooling_factor,
            adjusted_annual_kwh: annual_kwh * cooling_factor,
        },
        carbon: CarbonImpact {
            annual_tons_co2,
            equivalent_cars: annual_tons_co2 / CAR_TONS_CO2_PER_YEAR,
            equivalent_homes: annual_kwh / HOUSEHOLD_KWH_PER_YEAR,
        },
        water: WaterImpact {
            daily_gallons,
            annual_gallons,
            percent_increase: ratio_percent(daily_gallons as f64, regional_water),
            olympic_pools_per_year: annual_gallons / OLYMPIC_POOL_GALLONS,
        },
        economic: EconomicImpact {
            jobs_created: spec.employees,
            estimated_construction_cost: spec.square_feet as f64 * CONSTRUCTION_COST_PER_SQFT,
            annual_operating_cost: annual_cost * OPERATING_COST_MULTIPLIER,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impact::DataCenterTier;

    fn approx(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-6 * b.abs().max(1.0), "{} != {}", a, b);
    }

    fn baseline() -> (LocationData, EnergyData, ClimateData) {
        (
            LocationData {
                name: "Test County".to_string(),
                population: 100_000,
                median_income: 60_000,
                state_code: "US".to_string(),
            },
            EnergyData {
                price_per_kwh: 0.11,
                state: "US".to_string(),
            },
            ClimateData::default(),
        )
    }

    #[test]
    fn test_medium_tier_figures() {
        let (location, energy, climate) = baseline();
        let report = calculate_impact(&DataCenterTier::Medium.spec(), &location, &energy, &climate);

        approx(report.energy.annual_kwh, 87_600_000.0);
        approx(report.energy.annual_mwh, 87_600.0);
        approx(report.energy.annual_cost, 9_636_000.0);
        approx(report.energy.percent_increase, 21.9);
        approx(report.energy.cost_per_household_annually, 240.9);
        approx(report.energy.cooling_factor, 1.0);
        approx(report.carbon.annual_tons_co2, 40_296.0);
        approx(report.water.percent_increase, 300_000.0 / 8_200_000.0 * 100.0);
        assert_eq!(report.economic.jobs_created, 50);
        approx(report.economic.estimated_construction_cost, 50_000_000.0);
    }

    #[test]
    fn test_zero_population_does_not_divide_by_zero() {
        let (mut location, energy, climate) = baseline();
        location.population = 0;
        let report = calculate_impact(&DataCenterTier::Small.spec(), &location, &energy, &climate);

        assert_eq!(report.energy.percent_increase, 0.0);
        assert_eq!(report.energy.cost_per_household_annually, 0.0);
        assert_eq!(report.water.percent_increase, 0.0);
    }

    #[test]
    fn test_hot_climate_raises_cooling_factor() {
        let (location, energy, mut climate) = baseline();
        climate.temperature_f = 95.0;
        let report = calculate_impact(&DataCenterTier::Small.spec(), &location, &energy, &climate);

        approx(report.energy.cooling_factor, 1.25);
        approx(report.energy.adjusted_annual_kwh, report.energy.annual_kwh * 1.25);
    }
}
