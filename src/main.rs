fn main() {
    lidar_seg_pipeline::cli::run();
}
