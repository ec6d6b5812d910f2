#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use bytes::Bytes;

    use crate::context::FfmpegContextFactory;
    use crate::error::{ErrorKind, PcmError};
    use crate::pipeline::{target_frame_count, EncodeOrchestrator, PipelineOptions, Resampler};
    use crate::tests::fixtures::{sine, sine_wav, truncated_wav, wav, WavFormat};
    use crate::types::{InputAudioFile, TARGET_SAMPLE_RATE};

    fn factory() -> Arc<FfmpegContextFactory> {
        Arc::new(FfmpegContextFactory::new().unwrap())
    }

    fn orchestrator() -> EncodeOrchestrator<FfmpegContextFactory> {
        EncodeOrchestrator::new(factory(), PipelineOptions::default())
    }

    #[test]
    fn test_resampled_rate_is_48k_for_common_sources() {
        let resampler = Resampler::new(factory());
        for rate in [8_000u32, 11_025, 16_000, 22_050, 32_000, 44_100, 48_000, 88_200, 96_000, 192_000] {
            let frames = rate as usize / 10;
            let out = resampler.resample(sine_wav(rate, frames)).unwrap();
            assert_eq!(out.sample_rate(), TARGET_SAMPLE_RATE, "source {} Hz", rate);
            assert_eq!(
                out.frame_count(),
                target_frame_count(frames, rate, TARGET_SAMPLE_RATE).unwrap(),
                "source {} Hz",
                rate
            );
            assert_eq!(out.frame_count(), 4_800);
        }
    }

    #[test]
    fn test_odd_length_rounds_half_up() {
        let resampler = Resampler::new(factory());
        // 441 * 48000 / 44100 = 480, 7 * 48000 / 96000 = 3.5 -> 4
        let out = resampler.resample(sine_wav(44_100, 441)).unwrap();
        assert_eq!(out.frame_count(), 480);
        let out = resampler.resample(sine_wav(96_000, 7)).unwrap();
        assert_eq!(out.frame_count(), 4);
    }

    #[test]
    fn test_resampling_keeps_amplitude() {
        let resampler = Resampler::new(factory());
        let out = resampler.resample(sine_wav(44_100, 44_100)).unwrap();
        let left = out.channel(0).unwrap();
        let peak = left[4_800..43_200]
            .iter()
            .fold(0.0f32, |acc, s| acc.max(s.abs()));
        assert!((0.45..0.55).contains(&peak), "peak {}", peak);
    }

    #[test]
    fn test_mono_is_duplicated_to_stereo() {
        let orch = orchestrator();
        let file = InputAudioFile::new("mono.wav", sine_wav(22_050, 2_205), 0);
        let pcm = orch.convert_file(&file).unwrap();
        assert_eq!(pcm.frame_count(), 4_800);
        for frame in pcm.samples().chunks_exact(2) {
            assert_eq!(frame[0], frame[1]);
        }
    }

    #[test]
    fn test_extra_channels_are_ignored() {
        let planes = vec![vec![0.5f32; 480], vec![-0.5f32; 480], vec![0.9f32; 480]];
        let file = InputAudioFile::new("three.wav", wav(WavFormat::F32, 48_000, &planes), 0);
        let pcm = orchestrator().convert_file(&file).unwrap();
        assert_eq!(pcm.len(), 2 * 480);
        assert_eq!(&pcm.samples()[..4], &[16383, -16384, 16383, -16384]);
    }

    #[test]
    fn test_out_of_range_samples_are_clamped() {
        let planes = vec![vec![1.5f32, -1.5, 0.0, 0.25]];
        let file = InputAudioFile::new("loud.wav", wav(WavFormat::F32, 48_000, &planes), 0);
        let pcm = orchestrator().convert_file(&file).unwrap();
        assert_eq!(pcm.samples(), &[32767, 32767, -32768, -32768, 0, 0, 8191, 8191]);
    }

    #[test]
    fn test_interleaved_length_is_twice_resampled_frames() {
        let orch = orchestrator();
        for (rate, frames) in [(8_000u32, 333usize), (44_100, 1_001), (96_000, 9_999)] {
            let planes = vec![sine(220.0, rate, frames, 0.3), sine(330.0, rate, frames, 0.3)];
            let file = InputAudioFile::new("s.wav", wav(WavFormat::S16, rate, &planes), 0);
            let pcm = orch.convert_file(&file).unwrap();
            let expected = target_frame_count(frames, rate, TARGET_SAMPLE_RATE).unwrap();
            assert_eq!(pcm.len(), 2 * expected);
            assert_eq!(pcm.len() % 2, 0);
        }
    }

    #[test]
    fn test_three_files_named_by_position() {
        let files = InputAudioFile::ordered(vec![
            ("a.wav", sine_wav(44_100, 4_410)),
            ("b.wav", sine_wav(32_000, 3_200)),
            ("c.wav", sine_wav(48_000, 4_800)),
        ]);
        let outcome = orchestrator().run_blocking(files);
        let names: Vec<&str> = outcome.batch.parts().iter().map(|p| p.part_name()).collect();
        assert_eq!(names, vec!["pcmData.0.pcm", "pcmData.1.pcm", "pcmData.2.pcm"]);
        assert!(outcome.failures.is_empty());
        for part in outcome.batch.parts() {
            assert_eq!(part.payload().len(), 4_800 * 2 * 2);
        }
    }

    #[test]
    fn test_prepare_files_uses_list_order() {
        let outcome = crate::prepare_files(vec![
            ("b.wav", sine_wav(22_050, 2_205)),
            ("a.wav", sine_wav(48_000, 4_800)),
        ])
        .unwrap();
        assert!(outcome.is_complete_success());
        assert_eq!(outcome.batch.parts()[0].field_name(), "b.wav");
        assert_eq!(outcome.batch.parts()[1].part_name(), "pcmData.1.pcm");
    }

    #[test]
    fn test_corrupt_middle_file_is_isolated() {
        let files = InputAudioFile::ordered(vec![
            ("first.wav", sine_wav(44_100, 4_410)),
            ("broken.mp3", truncated_wav()),
            ("third.wav", sine_wav(16_000, 1_600)),
        ]);
        let outcome = orchestrator().run_blocking(files);

        let names: Vec<&str> = outcome.batch.parts().iter().map(|p| p.part_name()).collect();
        assert_eq!(names, vec!["pcmData.0.pcm", "pcmData.2.pcm"]);
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].index, 1);
        assert_eq!(outcome.failures[0].name, "broken.mp3");
        assert_eq!(outcome.failures[0].kind, ErrorKind::DecodeError);
    }

    #[test]
    fn test_conversion_is_deterministic() {
        let orch = orchestrator();
        let bytes = wav(
            WavFormat::S16,
            44_100,
            &[sine(440.0, 44_100, 10_000, 0.7), sine(523.0, 44_100, 10_000, 0.4)],
        );
        let a = orch.convert_file(&InputAudioFile::new("x", bytes.clone(), 0)).unwrap();
        let b = orch.convert_file(&InputAudioFile::new("x", bytes, 0)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_empty_and_header_only_inputs_fail_to_decode() {
        let orch = orchestrator();
        let empty = InputAudioFile::new("empty.wav", Bytes::new(), 0);
        assert!(matches!(orch.convert_file(&empty), Err(PcmError::Decode(_))));

        let no_samples = InputAudioFile::new("silent.wav", wav(WavFormat::S16, 48_000, &[vec![]]), 1);
        assert!(matches!(orch.convert_file(&no_samples), Err(PcmError::Decode(_))));
    }

    #[tokio::test]
    async fn test_async_batch_renders_multipart() {
        let files = InputAudioFile::ordered(vec![
            ("one.wav", sine_wav(48_000, 10)),
            ("two.wav", sine_wav(48_000, 20)),
        ]);
        let outcome = orchestrator().run(files).await;
        let body = outcome.batch.to_multipart("boundary42");
        let text = String::from_utf8_lossy(&body);

        let first = text
            .find("name=\"one.wav\"; filename=\"pcmData.0.pcm\"")
            .unwrap();
        let second = text
            .find("name=\"two.wav\"; filename=\"pcmData.1.pcm\"")
            .unwrap();
        assert!(first < second);
        assert!(text.ends_with("--boundary42--\r\n"));
        assert_eq!(text.matches("--boundary42\r\n").count(), 2);
    }
}
