use serde::Deserialize;

#[derive(Deserialize)]
pub struct Data {
    pub token: Option<String>,
}

#[derive(Deserialize)]
pub struct Login {
    pub data: Option<Data>,
}
