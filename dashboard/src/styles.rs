mod global {
    turf::style_sheet!("assets/global.css");
}

mod silo_list {
    turf::style_sheet!("assets/silo_list.css");
}

mod charts {
    turf::style_sheet!("assets/charts.css");
}

pub use charts::ClassName as Charts;
pub use global::ClassName as Global;
pub use silo_list::ClassName as SiloList;

use std::sync::LazyLock;

pub static ALL: LazyLock<String> = LazyLock::new(|| {
    [
        global::STYLE_SHEET,
        silo_list::STYLE_SHEET,
        charts::STYLE_SHEET,
    ]
    .join("\n")
});
