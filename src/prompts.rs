//! Prompt builders for the hosted model.

use crate::impact::{ClimateData, DataCenterSpec, EnergyData, ImpactReport, LocationData};

/// Completion budget for free-form team questions
pub const QUERY_MAX_TOKENS: u32 = 500;
/// Completion budget for team summaries
pub const SUMMARY_MAX_TOKENS: u32 = 300;
/// Completion budget for suggestion lists
pub const SUGGESTIONS_MAX_TOKENS: u32 = 400;
/// Completion budget for the streamed impact analysis
pub const ANALYSIS_MAX_TOKENS: u32 = 2000;

/// System prompt scoping the assistant to one team
pub fn team_assistant_system(team_id: &str) -> String {
    format!(
        "You are an AI assistant for the {} team. Help answer questions about team projects, \
         tasks, and performance. Be concise and helpful.",
        team_id
    )
}

/// User prompt asking for a team status summary
pub fn team_summary(team_id: &str) -> String {
    format!(
        "Provide a brief summary of the {} team's current status, including recent activities \
         and key metrics.",
        team_id
    )
}

/// User prompt asking for improvement suggestions
pub fn team_suggestions(team_id: &str) -> String {
    format!(
        "Provide 3-5 actionable suggestions to improve the {} team's productivity and \
         collaboration.",
        team_id
    )
}

/// Full analysis prompt for a proposed data center
pub fn impact_analysis(
    spec: &DataCenterSpec,
    location: &LocationData,
    energy: &EnergyData,
    climate: &ClimateData,
    impact: &ImpactReport,
    latitude: f64,
    longitude: f64,
) -> String {
    format!(
        r#"You are an environmental impact analyst for data centers. Analyze the following data center proposal:

DATA CENTER SPECIFICATIONS:
- Type: {name}
- Power Consumption: {power} MW
- Number of Servers: {servers}
- Size: {sqft} square feet
- Daily Water Usage: {water} gallons
- Employees: {employees}

LOCATION DATA:
- Coordinates: {lat}, {lon}
- Location: {location_name}
- Population: {population}
- Median Income: ${income}

ENERGY DATA:
- Local Electricity Rate: ${price:.3} per kWh
- State: {state}

CLIMATE DATA:
- Temperature: {temp}°F
- Humidity: {humidity}%
- Conditions: {conditions}

CALCULATED IMPACTS:
- Annual Energy Use: {mwh:.0} MWh
- Annual Energy Cost: ${cost:.0}
- Increase in Regional Energy Demand: {energy_pct:.2}%
- Additional Cost Per Household: ${per_household:.2}/year
- Annual CO2 Emissions: {co2:.0} tons (equivalent to {cars:.0} cars)
- Annual Water Usage: {annual_water:.0} gallons ({water_pct:.2}% of regional demand)
- Jobs Created: {jobs}
- Estimated Construction Cost: ${construction:.0}

Please provide a comprehensive analysis covering:
1. **Overall Environmental Impact**
2. **Energy Infrastructure** - Can the local grid handle this?
3. **Water Resources** - Impact on local water supply
4. **Community Impact** - Effects on residents
5. **Climate Considerations** - How local climate affects cooling needs
6. **Recommendations** - Mitigation strategies and site suitability
7. **Regulatory Considerations**

Be specific, data-driven, and balanced (mention both concerns and benefits)."#,
        name = spec.name,
        power = spec.power_mw,
        servers = spec.servers,
        sqft = spec.square_feet,
        water = spec.water_gallons_per_day,
        employees = spec.employees,
        lat = latitude,
        lon = longitude,
        location_name = location.name,
        population = location.population,
        income = location.median_income,
        price = energy.price_per_kwh,
        state = energy.state,
        temp = climate.temperature_f,
        humidity = climate.humidity,
        conditions = climate.description,
        mwh = impact.energy.annual_mwh,
        cost = impact.energy.annual_cost,
        energy_pct = impact.energy.percent_increase,
        per_household = impact.energy.cost_per_household_annually,
        co2 = impact.carbon.annual_tons_co2,
        cars = impact.carbon.equivalent_cars,
        annual_water = impact.water.annual_gallons,
        water_pct = impact.water.percent_increase,
        jobs = impact.economic.jobs_created,
        construction = impact.economic.estimated_construction_cost,
    )
}

/// Split a suggestions completion into one entry per non-blank line
pub fn split_suggestions(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_team_prompts_mention_team() {
        assert!(team_assistant_system("backend").contains("the backend team"));
        assert!(team_summary("mobile").contains("mobile team's current status"));
        assert!(team_suggestions("devops").contains("3-5 actionable suggestions"));
    }

    #[test]
    fn test_split_suggestions_drops_blank_lines() {
        let text = "1. Pair more\n\n  2. Ship smaller PRs  \n\n";
        assert_eq!(
            split_suggestions(text),
            vec!["1. Pair more".to_string(), "2. Ship smaller PRs".to_string()]
        );
    }
}
