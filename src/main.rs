fn main() {
    approach_clustering::cli::run();
}
