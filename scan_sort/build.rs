fn main() {
    #[cfg(feature = "cuda")]
    {
        use cuda_builder::CudaBuilder;

        CudaBuilder::new("../scan_sort_gpu")
            .copy_to("../resources/scan_sort_gpu.ptx")
            .build()
            .unwrap();
    }
}
