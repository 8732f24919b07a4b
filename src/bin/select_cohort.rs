use cohorts::app::run_select_cohort;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    run_select_cohort(std::env::args().skip(1))
}
