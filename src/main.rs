fn main() -> std::process::ExitCode {
    scpsync_lib::run()
}
