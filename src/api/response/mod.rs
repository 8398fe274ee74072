pub mod login;
pub mod realtime_power;
pub mod station_info;
pub mod station_list;
