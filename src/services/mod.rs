pub mod batch;
pub mod climate;
pub mod drought;
pub mod evaporation;
pub mod light;
pub mod overrides;
pub mod readings;
pub mod report;
pub mod soil_water;
pub mod temperature;
pub mod thermal_time;
