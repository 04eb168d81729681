use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Rings drawn around the site
pub const HEATMAP_RINGS: u32 = 8;
/// Points per ring
pub const HEATMAP_POINTS_PER_RING: u32 = 16;
/// Impact value at the site itself
pub const CENTER_IMPACT: f64 = 10.0;
/// Default radius of the overlay in miles
pub const DEFAULT_RADIUS_MILES: f64 = 5.0;

const MILES_PER_DEGREE_LAT: f64 = 69.0;
/// How far industrial emissions drift with the wind
const EMISSIONS_WIND_MULTIPLIER: f64 = 1.8;
const TEMPERATURE_BASELINE_F: f64 = 70.0;

/// Inputs to the overlay model
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HeatInputs {
    pub carbon_tons: f64,
    pub max_carbon_tons: f64,
    pub max_radius_km: f64,
    pub wind_speed_mps: f64,
    pub temperature_f: f64,
    pub pue: f64,
}

impl Default for HeatInputs {
    fn default() -> Self {
        Self {
            carbon_tons: 0.0,
            max_carbon_tons: 1.0,
            max_radius_km: 8.0,
            wind_speed_mps: 5.0,
            temperature_f: TEMPERATURE_BASELINE_F,
            pue: 1.4,
        }
    }
}

/// Visual radius and color intensity for the map overlay
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HeatOverlay {
    pub radius_km: f64,
    pub intensity: f64,
}

/// Wind from a compass bearing
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Wind {
    pub speed_mps: f64,
    /// Degrees clockwise from north the wind blows from
    pub direction_deg: f64,
}

/// A single weighted point of the heatmap
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HeatPoint {
    pub longitude: f64,
    pub latitude: f64,
    pub impact: f64,
}

/// Stretch applied to an impact radius at a given wind speed
pub fn wind_factor(speed_mps: f64, multiplier: f64) -> f64 {
    1.0 + (speed_mps / 10.0) * (multiplier - 1.0)
}

/// Compute the overlay for an amount of emitted carbon.
///
/// Radius grows linearly with the carbon share and never exceeds
/// `max_radius_km`. Wind disperses intensity, heat above 70°F and PUE
/// above 1.0 raise it. The result stays within [0, 1].
pub fn heat_overlay(inputs: &HeatInputs) -> HeatOverlay {
    let share = if inputs.max_carbon_tons > 0.0 {
        (inputs.carbon_tons / inputs.max_carbon_tons).clamp(0.0, 1.0)
    } else {
        0.0
    };

    let radius_km = (inputs.max_radius_km * share).min(inputs.max_radius_km).max(0.0);

    let dispersion = 1.0 / (1.0 + inputs.wind_speed_mps.max(0.0) / 20.0);
    let heat_bump = (inputs.temperature_f - TEMPERATURE_BASELINE_F).max(0.0) / 100.0;
    let pue_offset = (inputs.pue - 1.0).max(0.0) * 0.1;

    let intensity = (share * dispersion + heat_bump + pue_offset).clamp(0.0, 1.0);

    HeatOverlay {
        radius_km,
        intensity,
    }
}

/// Concentric rings of weighted points around a site.
///
/// The center carries the full impact and each ring fades linearly to zero
/// at the outer edge. With wind, rings stretch downwind and shrink upwind.
pub fn circular_heatmap(
    center_lng: f64,
    center_lat: f64,
    radius_miles: f64,
    wind: Option<Wind>,
) -> Vec<HeatPoint> {
    let lat_degrees_per_mile = 1.0 / MILES_PER_DEGREE_LAT;
    let lng_degrees_per_mile =
        1.0 / (MILES_PER_DEGREE_LAT * (center_lat * PI / 180.0).cos().max(1e-6));

    let stretch = wind
        .map(|w| wind_factor(w.speed_mps, EMISSIONS_WIND_MULTIPLIER) - 1.0)
        .unwrap_or(0.0);
    // Emissions travel away from where the wind comes from
    let downwind = wind.map(|w| (w.direction_deg + 180.0).to_radians());

    let mut points =
        Vec::with_capacity(1 + (HEATMAP_RINGS * HEATMAP_POINTS_PER_RING) as usize);
    points.push(HeatPoint {
        longitude: center_lng,
        latitude: center_lat,
        impact: CENTER_IMPACT,
    });

    for ring in 1..=HEATMAP_RINGS {
        let ring_radius = radius_miles / HEATMAP_RINGS as f64 * ring as f64;
        let ring_impact = CENTER_IMPACT * (1.0 - ring as f64 / HEATMAP_RINGS as f64);

        for i in 0..HEATMAP_POINTS_PER_RING {
            let angle = 2.0 * PI * i as f64 / HEATMAP_POINTS_PER_RING as f64;
            let skew = match downwind {
                Some(toward) => {
                    // angle is measured from east, bearings from north
                    let bearing = PI / 2.0 - angle;
                    1.0 + stretch * (bearing - toward).cos()
                }
                None => 1.0,
            };
            let distance = ring_radius * skew.max(0.0);

            points.push(HeatPoint {
                longitude: center_lng + distance * lng_degrees_per_mile * angle.cos(),
                latitude: center_lat + distance * lat_degrees_per_mile * angle.sin(),
                impact: ring_impact,
            });
        }
    }

    points
}

/// Display label for the impact level of an overlay
pub fn impact_level(intensity: f64) -> &'static str {
    match intensity {
        i if i >= 0.75 => "Severe",
        i if i >= 0.5 => "High",
        i if i >= 0.25 => "Moderate",
        _ => "Low",
    }
}
