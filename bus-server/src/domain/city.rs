//! Supported cities and their provider names.

use serde::Serialize;

/// A city the provider publishes bus data for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct City {
    /// Local name, e.g. `"台北市"`.
    pub name: &'static str,
    /// Path segment used by the provider, e.g. `"Taipei"`.
    pub tdx_name: &'static str,
}

const fn city(name: &'static str, tdx_name: &'static str) -> City {
    City { name, tdx_name }
}

pub const CITIES: [City; 22] = [
    city("台北市", "Taipei"),
    city("新北市", "NewTaipei"),
    city("桃園市", "Taoyuan"),
    city("台中市", "Taichung"),
    city("台南市", "Tainan"),
    city("高雄市", "Kaohsiung"),
    city("基隆市", "Keelung"),
    city("新竹市", "Hsinchu"),
    city("新竹縣", "HsinchuCounty"),
    city("苗栗縣", "MiaoliCounty"),
    city("彰化縣", "ChanghuaCounty"),
    city("南投縣", "NantouCounty"),
    city("雲林縣", "YunlinCounty"),
    city("嘉義縣", "ChiayiCounty"),
    city("嘉義市", "Chiayi"),
    city("屏東縣", "PingtungCounty"),
    city("宜蘭縣", "YilanCounty"),
    city("花蓮縣", "HualienCounty"),
    city("台東縣", "TaitungCounty"),
    city("澎湖縣", "PenghuCounty"),
    city("金門縣", "KinmenCounty"),
    city("連江縣", "LienchiangCounty"),
];

impl City {
    pub fn all() -> &'static [City] {
        &CITIES
    }

    /// Find the city a free-form local name belongs to.
    ///
    /// Accepts the traditional `臺` spelling and trailing district text, so
    /// `"臺北市大安區"` resolves to Taipei.
    pub fn find_by_local_name(name: &str) -> Option<City> {
        let normalized = name.trim().replace('臺', "台");
        CITIES
            .iter()
            .find(|c| normalized.starts_with(c.name))
            .copied()
    }

    /// Find a city by its provider name, ignoring ASCII case.
    pub fn find_by_tdx_name(tdx_name: &str) -> Option<City> {
        CITIES
            .iter()
            .find(|c| c.tdx_name.eq_ignore_ascii_case(tdx_name))
            .copied()
    }
}
