use echoswarm::error::AppResult;

fn main() -> AppResult<()> {
    echoswarm::run()
}
