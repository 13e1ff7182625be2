use sqlx::MySqlPool;

use super::models::{ClimateRow, IrrigationRow, PrecipitationRow, RadiationRow, TrialDatesRow};

/// Trial window bounds for a culture: planting + 14 days to termination.
pub async fn get_trial_dates(
    pool: &MySqlPool,
    culture_id: i64,
) -> Result<Option<TrialDatesRow>, sqlx::Error> {
    sqlx::query_as::<_, TrialDatesRow>(
        "SELECT DATE(C.planted + INTERVAL 14 DAY) AS start_date,
                DATE(C.terminated) AS end_date
         FROM cultures C
         WHERE C.id = ?",
    )
    .bind(culture_id)
    .fetch_optional(pool)
    .await
}

/// Daily precipitation at the culture's location, ordered by date.
pub async fn get_precipitation(
    pool: &MySqlPool,
    culture_id: i64,
) -> Result<Vec<PrecipitationRow>, sqlx::Error> {
    sqlx::query_as::<_, PrecipitationRow>(
        "SELECT DATE(P.datum) AS day,
                CAST(P.amount AS DECIMAL(12,4)) AS amount
         FROM precipitation P
         JOIN cultures C ON P.location_id = C.location_id
         WHERE C.id = ?
         ORDER BY P.datum",
    )
    .bind(culture_id)
    .fetch_all(pool)
    .await
}

/// Irrigation events of a culture, ordered by date.
pub async fn get_irrigation(
    pool: &MySqlPool,
    culture_id: i64,
) -> Result<Vec<IrrigationRow>, sqlx::Error> {
    sqlx::query_as::<_, IrrigationRow>(
        "SELECT DATE(I.datum) AS day,
                CAST(I.amount AS DECIMAL(12,4)) AS amount,
                CAST(I.treatment_id AS SIGNED) AS treatment_id
         FROM irrigation I
         WHERE I.culture_id = ?
         ORDER BY I.datum",
    )
    .bind(culture_id)
    .fetch_all(pool)
    .await
}

/// Hourly windspeed joined with temperature and relative humidity from the
/// weather stations assigned to the culture's location, within the trial
/// window. Rows flagged invalid are excluded.
pub async fn get_hourly_climate(
    pool: &MySqlPool,
    culture_id: i64,
) -> Result<Vec<ClimateRow>, sqlx::Error> {
    sqlx::query_as::<_, ClimateRow>(
        "SELECT wind.measured_at AS measured_at,
                CAST(temp.temperature AS DECIMAL(12,4)) AS temperature,
                CAST(wind.windspeed AS DECIMAL(12,4)) AS windspeed,
                CAST(hum.rel_humidity AS DECIMAL(12,4)) AS rel_humidity
         FROM cultures C
         INNER JOIN (
             SELECT C.id AS culture_id, FFHM.datum AS measured_at, FFHM.amount AS windspeed
             FROM dwd_hourlyMeanWindspeed_FFHM FFHM
             LEFT JOIN usesWeatherStation uWS
                 ON uWS.station_id = FFHM.station_id AND uWS.stationData = 'FFHM'
             LEFT JOIN cultures C ON C.location_id = uWS.location_id
             WHERE C.id = ?
               AND FFHM.datum >= C.planted + INTERVAL 14 DAY
               AND FFHM.datum < C.terminated
               AND FFHM.invalid IS NULL
         ) wind ON C.id = wind.culture_id
         LEFT JOIN (
             SELECT TAHV.datum AS measured_at, TAHV.amount AS temperature
             FROM dwd_hourlyAirTemperature_TAHV TAHV
             LEFT JOIN usesWeatherStation uWS
                 ON uWS.station_id = TAHV.station_id AND uWS.stationData = 'TAHV'
             LEFT JOIN cultures C ON C.location_id = uWS.location_id
             WHERE C.id = ?
               AND TAHV.datum >= C.planted + INTERVAL 14 DAY
               AND TAHV.datum < C.terminated
               AND TAHV.invalid IS NULL
         ) temp ON wind.measured_at = temp.measured_at
         LEFT JOIN (
             SELECT UUHV.datum AS measured_at, UUHV.amount AS rel_humidity
             FROM dwd_hourlyRelHumidity_UUHV UUHV
             LEFT JOIN usesWeatherStation uWS
                 ON uWS.station_id = UUHV.station_id AND uWS.stationData = 'UUHV'
             LEFT JOIN cultures C ON C.location_id = uWS.location_id
             WHERE C.id = ?
               AND UUHV.datum >= C.planted + INTERVAL 14 DAY
               AND UUHV.datum < C.terminated
               AND UUHV.invalid IS NULL
         ) hum ON temp.measured_at = hum.measured_at
         ORDER BY wind.measured_at",
    )
    .bind(culture_id)
    .bind(culture_id)
    .bind(culture_id)
    .fetch_all(pool)
    .await
}

/// Hourly synthetic solar radiation at the culture's location within the
/// trial window.
pub async fn get_hourly_radiation(
    pool: &MySqlPool,
    culture_id: i64,
) -> Result<Vec<RadiationRow>, sqlx::Error> {
    sqlx::query_as::<_, RadiationRow>(
        "SELECT sC.datum AS measured_at,
                CAST(sC.amount AS DECIMAL(14,4)) AS amount
         FROM solarCalc_hourlySolarRadiation sC
         JOIN cultures C ON C.location_id = sC.location_id
         WHERE C.id = ?
           AND sC.datum >= C.planted + INTERVAL 14 DAY
           AND sC.datum < C.terminated
         ORDER BY sC.datum",
    )
    .bind(culture_id)
    .fetch_all(pool)
    .await
}

/// Cheap connectivity check.
pub async fn ping(pool: &MySqlPool) -> Result<(), sqlx::Error> {
    sqlx::query_scalar::<_, i64>("SELECT 1").fetch_one(pool).await?;
    Ok(())
}
