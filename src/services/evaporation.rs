//! Daily evaporation estimate from hourly temperature, humidity and wind.
//!
//! Penman (1948) open-water evaporation driven by the mean vapour pressure
//! deficit and mean windspeed of the day.

use chrono::NaiveDate;
use std::collections::BTreeMap;

use super::readings::HourlyClimateReading;

/// Conversion factor from m/s to mph.
const MS_TO_MPH: f64 = 2.23693629205;

/// Penman coefficient for evaporation in mm/day.
const PENMAN_COEFFICIENT: f64 = 0.376;

/// Penman windspeed exponent.
const PENMAN_WIND_EXPONENT: f64 = 0.76;

/// Evaporation in mm/day per calendar date. Dates without enough data are absent.
pub type DailyEvaporation = BTreeMap<NaiveDate, f64>;

/// Vapour pressure deficit in kPa.
///
/// Saturation curve from the LI-COR LI-6400 manual (Buck 1981):
/// vp_sat = 0.61365 * exp(17.502*T / (240.97+T))
///
/// `rel_humidity` is a fraction between 0.0 and 1.0.
pub fn vapour_pressure_deficit(t_celsius: f64, rel_humidity: f64) -> f64 {
    let vp_sat = 0.61365 * ((17.502 * t_celsius) / (240.97 + t_celsius)).exp();
    vp_sat * (1.0 - rel_humidity)
}

/// Penman evaporation in mm/day from a mean VPD and a mean windspeed in m/s.
pub fn penman_evaporation(vpd: f64, windspeed_ms: f64) -> f64 {
    PENMAN_COEFFICIENT * vpd * (windspeed_ms * MS_TO_MPH).powf(PENMAN_WIND_EXPONENT)
}

#[derive(Default)]
struct DailySums {
    vpd_sum: f64,
    vpd_count: u32,
    wind_sum: f64,
    wind_count: u32,
}

impl DailySums {
    fn evaporation(&self) -> Option<f64> {
        if self.vpd_count == 0 || self.wind_count == 0 {
            return None;
        }
        let mean_vpd = self.vpd_sum / f64::from(self.vpd_count);
        let mean_wind = self.wind_sum / f64::from(self.wind_count);
        Some(penman_evaporation(mean_vpd, mean_wind))
    }
}

/// Estimate evaporation for every date that has at least one hour with both
/// temperature and humidity, and at least one hour with windspeed.
pub fn daily_evaporation(climate: &[HourlyClimateReading]) -> DailyEvaporation {
    let mut sums: BTreeMap<NaiveDate, DailySums> = BTreeMap::new();

    for reading in climate {
        let day = sums.entry(reading.date()).or_default();
        if let (Some(t), Some(rh)) = (reading.temperature_c, reading.relative_humidity_pct) {
            day.vpd_sum += vapour_pressure_deficit(t, rh / 100.0);
            day.vpd_count += 1;
        }
        if let Some(wind) = reading.windspeed_ms {
            day.wind_sum += wind;
            day.wind_count += 1;
        }
    }

    sums.into_iter()
        .filter_map(|(date, day)| day.evaporation().map(|evap| (date, evap)))
        .collect()
}
