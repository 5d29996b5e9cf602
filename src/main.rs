fn main() {
    std::process::exit(sketch_tracker_lib::run());
}
