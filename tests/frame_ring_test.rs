//! Device-backed checks of the buffered frame ring: slot isolation, primed
//! content and write preconditions.

#[cfg(feature = "integration-tests")]
mod common;

#[cfg(feature = "integration-tests")]
mod ring {
    use cgmath::{Matrix4, Vector3};
    use strata_ngin::data_structures::scene::{MaterialAttributes, TransformRaw};
    use strata_ngin::error::RenderError;
    use strata_ngin::resources::frame_ring::FrameResourceRing;

    use crate::common::test_utils::{read_back, request_test_device};

    fn translation(x: f32) -> TransformRaw {
        Matrix4::from_translation(Vector3::new(x, 0.0, 0.0)).into()
    }

    fn initial_content() -> (Vec<TransformRaw>, Vec<MaterialAttributes>) {
        (
            vec![translation(0.0), translation(1.0)],
            vec![MaterialAttributes::default()],
        )
    }

    #[test]
    fn written_slot_reads_back_the_new_content() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let (device, queue) = request_test_device().await;
            let (transforms, materials) = initial_content();
            let mut ring = FrameResourceRing::new(&device, 3, &transforms, &materials).unwrap();

            let updated = vec![translation(5.0), translation(6.0)];
            ring.write(&device, &queue, 0, &updated, &materials).unwrap();

            let (buffer, _) = ring.buffers(0).unwrap();
            let contents: Vec<TransformRaw> = read_back(&device, &queue, buffer, 2).await;
            assert_eq!(contents, updated);
        });
    }

    #[test]
    fn writes_do_not_bleed_into_other_slots() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let (device, queue) = request_test_device().await;
            let (transforms, materials) = initial_content();
            let mut ring = FrameResourceRing::new(&device, 2, &transforms, &materials).unwrap();

            let updated = vec![translation(9.0), translation(9.0)];
            ring.write(&device, &queue, 1, &updated, &materials).unwrap();

            // Slot 0 still holds the content it was primed with.
            let (buffer, _) = ring.buffers(0).unwrap();
            let contents: Vec<TransformRaw> = read_back(&device, &queue, buffer, 2).await;
            assert_eq!(contents, transforms);
        });
    }

    #[test]
    fn write_after_a_marked_submission_waits_out_the_fence() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let (device, queue) = request_test_device().await;
            let (transforms, materials) = initial_content();
            let mut ring = FrameResourceRing::new(&device, 2, &transforms, &materials).unwrap();

            // Submit work that reads slot 0, then record it as the slot's
            // fence.
            let size = (2 * std::mem::size_of::<TransformRaw>()) as wgpu::BufferAddress;
            let scratch = device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("slot reader"),
                size,
                usage: wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });
            let submission = {
                let (buffer, _) = ring.buffers(0).unwrap();
                let mut encoder =
                    device.create_command_encoder(&wgpu::CommandEncoderDescriptor { label: None });
                encoder.copy_buffer_to_buffer(buffer, 0, &scratch, 0, size);
                queue.submit(std::iter::once(encoder.finish()))
            };
            ring.mark_submitted(0, submission).unwrap();

            // The write blocks on that submission and then lands in full.
            let updated = vec![translation(7.0), translation(8.0)];
            ring.write(&device, &queue, 0, &updated, &materials).unwrap();

            let (buffer, _) = ring.buffers(0).unwrap();
            let contents: Vec<TransformRaw> = read_back(&device, &queue, buffer, 2).await;
            assert_eq!(contents, updated);
        });
    }

    #[test]
    fn marking_an_out_of_range_slot_is_rejected() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let (device, queue) = request_test_device().await;
            let (transforms, materials) = initial_content();
            let mut ring = FrameResourceRing::new(&device, 2, &transforms, &materials).unwrap();

            let submission = queue.submit(std::iter::empty());
            assert!(matches!(
                ring.mark_submitted(5, submission),
                Err(RenderError::Precondition(_))
            ));
        });
    }

    #[test]
    fn out_of_range_slot_is_rejected() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let (device, queue) = request_test_device().await;
            let (transforms, materials) = initial_content();
            let mut ring = FrameResourceRing::new(&device, 2, &transforms, &materials).unwrap();

            let result = ring.write(&device, &queue, 5, &transforms, &materials);
            assert!(matches!(result, Err(RenderError::Precondition(_))));
        });
    }

    #[test]
    fn mismatched_content_size_is_rejected() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let (device, queue) = request_test_device().await;
            let (transforms, materials) = initial_content();
            let mut ring = FrameResourceRing::new(&device, 2, &transforms, &materials).unwrap();

            let wrong_size = vec![translation(0.0)];
            let result = ring.write(&device, &queue, 0, &wrong_size, &materials);
            assert!(matches!(result, Err(RenderError::Precondition(_))));
        });
    }

    #[test]
    fn empty_ring_configuration_is_rejected() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let (device, _queue) = request_test_device().await;
            let (transforms, materials) = initial_content();
            assert!(matches!(
                FrameResourceRing::new(&device, 0, &transforms, &materials),
                Err(RenderError::Precondition(_))
            ));
            assert!(matches!(
                FrameResourceRing::new(&device, 2, &[], &materials),
                Err(RenderError::Precondition(_))
            ));
        });
    }
}
